// ── Canonical device state ──
//
// One record per sensor, written by both feeds. Each attribute is
// independent; a write replaces the previous value of that attribute only.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capability::Capability;

/// Air-quality category derived from the indoor air-quality index.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum AirQuality {
    #[default]
    Unknown,
    Excellent,
    Good,
    Fair,
    Poor,
    Inferior,
}

impl AirQuality {
    /// Classify a 0-100 index score.
    ///
    /// Thresholds are strict and checked from the top down.
    pub fn from_index(index: f64) -> Self {
        if index > 92.0 {
            Self::Excellent
        } else if index > 79.0 {
            Self::Good
        } else if index > 59.0 {
            Self::Fair
        } else if index > 39.0 {
            Self::Poor
        } else if index > 19.0 {
            Self::Inferior
        } else {
            Self::Unknown
        }
    }
}

/// A single canonical attribute update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    BatteryLevel(f64),
    /// Degrees Celsius.
    Temperature(f64),
    /// Relative humidity, percent.
    Humidity(f64),
    Flooded(bool),
    BinaryState(bool),
    AirQuality(AirQuality),
    VocDensity(f64),
    Pm25Density(f64),
}

impl AttributeValue {
    /// The capability a device must hold for this attribute to apply.
    pub fn capability(&self) -> Capability {
        match self {
            Self::BatteryLevel(_) => Capability::Battery,
            Self::Temperature(_) => Capability::Thermometer,
            Self::Humidity(_) => Capability::HumiditySensor,
            Self::Flooded(_) => Capability::FloodSensor,
            Self::BinaryState(_) => Capability::BinarySensor,
            Self::AirQuality(_) => Capability::AirQualitySensor,
            Self::VocDensity(_) => Capability::VocSensor,
            Self::Pm25Density(_) => Capability::Pm25Sensor,
        }
    }

    /// Attribute name as rendered in logs and sink output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BatteryLevel(_) => "batteryLevel",
            Self::Temperature(_) => "temperature",
            Self::Humidity(_) => "humidity",
            Self::Flooded(_) => "flooded",
            Self::BinaryState(_) => "binaryState",
            Self::AirQuality(_) => "airQuality",
            Self::VocDensity(_) => "vocDensity",
            Self::Pm25Density(_) => "pm25Density",
        }
    }
}

/// Latest known value of every attribute. `None` means never reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalState {
    pub battery_level: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub flooded: Option<bool>,
    pub binary_state: Option<bool>,
    pub air_quality: Option<AirQuality>,
    pub voc_density: Option<f64>,
    pub pm25_density: Option<f64>,
}

impl CanonicalState {
    /// Overwrite the attribute carried by `value`.
    pub fn apply(&mut self, value: AttributeValue) {
        match value {
            AttributeValue::BatteryLevel(v) => self.battery_level = Some(v),
            AttributeValue::Temperature(v) => self.temperature = Some(v),
            AttributeValue::Humidity(v) => self.humidity = Some(v),
            AttributeValue::Flooded(v) => self.flooded = Some(v),
            AttributeValue::BinaryState(v) => self.binary_state = Some(v),
            AttributeValue::AirQuality(v) => self.air_quality = Some(v),
            AttributeValue::VocDensity(v) => self.voc_density = Some(v),
            AttributeValue::Pm25Density(v) => self.pm25_density = Some(v),
        }
    }
}

/// Display unit for temperature. Devices report Celsius only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TemperatureUnit {
    #[strum(to_string = "celsius", serialize = "C")]
    Celsius,
    #[strum(to_string = "fahrenheit", serialize = "F")]
    Fahrenheit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_boundaries() {
        assert_eq!(AirQuality::from_index(100.0), AirQuality::Excellent);
        assert_eq!(AirQuality::from_index(93.0), AirQuality::Excellent);
        assert_eq!(AirQuality::from_index(92.0), AirQuality::Good);
        assert_eq!(AirQuality::from_index(80.0), AirQuality::Good);
        assert_eq!(AirQuality::from_index(79.0), AirQuality::Fair);
        assert_eq!(AirQuality::from_index(60.0), AirQuality::Fair);
        assert_eq!(AirQuality::from_index(59.0), AirQuality::Poor);
        assert_eq!(AirQuality::from_index(40.0), AirQuality::Poor);
        assert_eq!(AirQuality::from_index(39.0), AirQuality::Inferior);
        assert_eq!(AirQuality::from_index(20.0), AirQuality::Inferior);
        assert_eq!(AirQuality::from_index(19.0), AirQuality::Unknown);
        assert_eq!(AirQuality::from_index(0.0), AirQuality::Unknown);
        assert_eq!(AirQuality::from_index(-5.0), AirQuality::Unknown);
    }

    #[test]
    fn index_classifier_is_monotonic() {
        let rank = |q: AirQuality| match q {
            AirQuality::Unknown => 0,
            AirQuality::Inferior => 1,
            AirQuality::Poor => 2,
            AirQuality::Fair => 3,
            AirQuality::Good => 4,
            AirQuality::Excellent => 5,
        };
        let mut last = 0;
        for i in 0..=200 {
            let score = f64::from(i) / 2.0;
            let r = rank(AirQuality::from_index(score));
            assert!(r >= last, "classification dropped at {score}");
            last = r;
        }
    }

    #[test]
    fn apply_touches_one_attribute() {
        let mut state = CanonicalState::default();
        state.apply(AttributeValue::Temperature(21.5));
        state.apply(AttributeValue::Flooded(true));
        state.apply(AttributeValue::Temperature(22.0));

        assert_eq!(state.temperature, Some(22.0));
        assert_eq!(state.flooded, Some(true));
        assert_eq!(state.humidity, None);
    }

    #[test]
    fn attribute_capability_mapping() {
        assert_eq!(AttributeValue::Pm25Density(3.0).capability(), Capability::Pm25Sensor);
        assert_eq!(
            AttributeValue::AirQuality(AirQuality::Good).capability(),
            Capability::AirQualitySensor
        );
        assert_eq!(AttributeValue::BatteryLevel(90.0).capability(), Capability::Battery);
    }

    #[test]
    fn attribute_serializes_tagged() {
        let json = serde_json::to_value(AttributeValue::Humidity(40.0)).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "attribute": "humidity", "value": 40.0 }));
    }

    #[test]
    fn temperature_unit_parses_short_and_long() {
        assert_eq!("F".parse::<TemperatureUnit>().ok(), Some(TemperatureUnit::Fahrenheit));
        assert_eq!("celsius".parse::<TemperatureUnit>().ok(), Some(TemperatureUnit::Celsius));
        assert!("kelvin".parse::<TemperatureUnit>().is_err());
    }
}
