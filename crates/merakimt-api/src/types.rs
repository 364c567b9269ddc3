// Dashboard API wire types.
//
// Only the fields the sensor pipeline reads are modeled. Everything else
// the API returns is ignored by serde.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A device descriptor from `GET /organizations/{orgId}/devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDevice {
    pub serial: String,
    pub mac: String,
    #[serde(default)]
    pub model: String,
    /// User-assigned name. `null` for devices that were never named.
    #[serde(default)]
    pub name: Option<String>,
    /// Product class, e.g. `"sensor"`. Older API revisions omit it.
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub sensor: Option<SensorDetails>,
}

impl SensorDevice {
    /// Metric names the device declares support for.
    pub fn metrics(&self) -> &[String] {
        self.sensor.as_ref().map_or(&[], |s| s.metrics.as_slice())
    }

    /// Whether the descriptor belongs to the sensor product class.
    ///
    /// Descriptors without a `productType` are accepted, since the
    /// inventory request already filters on `productTypes[]=sensor`.
    pub fn is_sensor(&self) -> bool {
        self.product_type.as_deref().is_none_or(|t| t == "sensor")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorDetails {
    #[serde(default)]
    pub metrics: Vec<String>,
}

/// One device block from `GET /organizations/{orgId}/sensor/readings/latest`.
///
/// Readings stay raw until [`SensorReadings::decoded`] so that one
/// malformed reading cannot fail the whole response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReadings {
    pub serial: String,
    #[serde(default)]
    pub network: Option<NetworkRef>,
    #[serde(default)]
    pub readings: Vec<Value>,
}

impl SensorReadings {
    /// Decode each reading independently.
    pub fn decoded(
        &self,
    ) -> impl Iterator<Item = Result<SensorReading, serde_json::Error>> + '_ {
        self.readings.iter().map(SensorReading::deserialize)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single latest reading.
///
/// The value object sits under a key equal to the metric name:
/// `{"ts": "...", "metric": "temperature", "temperature": {"celsius": 21.5}}`.
/// All keys besides `ts` and `metric` are captured in `values`. `ts` is
/// kept untyped; firmware reports it as a string or as epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub ts: Option<Value>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl SensorReading {
    /// The value object for this reading's metric, if both are present.
    pub fn value(&self) -> Option<&Value> {
        self.values.get(self.metric.as_deref()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_metrics_default_to_empty() {
        let dev: SensorDevice = serde_json::from_value(json!({
            "serial": "Q3CA-AAAA-AAAA",
            "mac": "aa:bb:cc:dd:ee:ff",
        }))
        .unwrap();
        assert!(dev.metrics().is_empty());
        assert!(dev.is_sensor());
        assert!(dev.name.is_none());
    }

    #[test]
    fn device_product_type_filter() {
        let dev: SensorDevice = serde_json::from_value(json!({
            "serial": "Q2XX-AAAA-AAAA",
            "mac": "aa:bb:cc:dd:ee:01",
            "model": "MR46",
            "productType": "wireless",
        }))
        .unwrap();
        assert!(!dev.is_sensor());
    }

    #[test]
    fn reading_value_is_keyed_by_metric() {
        let reading: SensorReading = serde_json::from_value(json!({
            "ts": "2024-03-01T10:00:00Z",
            "metric": "temperature",
            "temperature": { "fahrenheit": 70.7, "celsius": 21.5 }
        }))
        .unwrap();
        assert_eq!(reading.metric.as_deref(), Some("temperature"));
        assert_eq!(reading.value().unwrap()["celsius"], 21.5);
    }

    #[test]
    fn reading_without_metric_has_no_value() {
        let reading: SensorReading = serde_json::from_value(json!({
            "temperature": { "celsius": 21.5 }
        }))
        .unwrap();
        assert!(reading.value().is_none());
    }

    #[test]
    fn readings_decode_one_at_a_time() {
        let block: SensorReadings = serde_json::from_value(json!({
            "serial": "Q3CA-AAAA-AAAA",
            "readings": [
                { "ts": 1_704_067_200, "metric": "temperature", "temperature": { "celsius": 21.5 } },
                { "metric": 7, "humidity": { "relativePercentage": 40 } },
                "garbage",
            ]
        }))
        .unwrap();

        let decoded: Vec<_> = block.decoded().collect();
        assert_eq!(decoded.len(), 3);
        let first = decoded[0].as_ref().unwrap();
        assert_eq!(first.ts, Some(json!(1_704_067_200)));
        assert_eq!(first.value().unwrap()["celsius"], 21.5);
        assert!(decoded[1].is_err());
        assert!(decoded[2].is_err());
    }
}
