// ── Polling reconciler ──
//
// One batched fetch of the latest readings for the whole network, applied
// to registered devices. A failed fetch abandons the cycle without
// touching the registry.

use std::sync::Arc;

use merakimt_api::{MerakiClient, SensorReadings};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::CoreError;
use crate::normalize::{Feed, is_known_metric, normalize};
use crate::store::DeviceRegistry;

/// Summary of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollReport {
    /// Device blocks matched to a registered device.
    pub devices: usize,
    /// Device blocks for serials the registry does not know.
    pub unknown_devices: usize,
    /// Updates accepted by the registry.
    pub applied: usize,
    /// Readings dropped: unknown metric, or capability mismatch.
    pub ignored: usize,
    /// Readings that failed to decode, lack a metric name, or carry an
    /// undecodable value.
    pub malformed: usize,
}

pub struct PollingReconciler {
    client: Arc<MerakiClient>,
    registry: Arc<DeviceRegistry>,
    network_id: String,
}

impl PollingReconciler {
    pub fn new(
        client: Arc<MerakiClient>,
        registry: Arc<DeviceRegistry>,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            registry,
            network_id: network_id.into(),
        }
    }

    /// Fetch and apply the latest readings.
    pub async fn poll_once(&self) -> Result<PollReport, CoreError> {
        let blocks = self.client.latest_sensor_readings(&self.network_id).await?;
        let report = self.apply(&blocks);
        self.registry.mark_polled();
        debug!(
            devices = report.devices,
            applied = report.applied,
            ignored = report.ignored,
            malformed = report.malformed,
            "poll complete"
        );
        Ok(report)
    }

    /// Apply already-fetched readings to the registry.
    pub fn apply(&self, blocks: &[SensorReadings]) -> PollReport {
        let mut report = PollReport::default();

        for block in blocks {
            if !self.registry.contains(&block.serial) {
                trace!(serial = %block.serial, "readings for unregistered device");
                report.unknown_devices += 1;
                continue;
            }
            report.devices += 1;

            for reading in block.decoded() {
                let reading = match reading {
                    Ok(reading) => reading,
                    Err(e) => {
                        warn!(
                            serial = %block.serial,
                            feed = %Feed::Poll,
                            error = %e,
                            "undecodable reading"
                        );
                        report.malformed += 1;
                        continue;
                    }
                };
                let Some(metric) = reading.metric.as_deref() else {
                    warn!(serial = %block.serial, feed = %Feed::Poll, "reading without metric name");
                    report.malformed += 1;
                    continue;
                };

                if !is_known_metric(metric) {
                    trace!(serial = %block.serial, metric, "unknown metric");
                    report.ignored += 1;
                    continue;
                }

                let Some(value) = reading.value().and_then(|v| normalize(metric, v)) else {
                    debug!(serial = %block.serial, metric, feed = %Feed::Poll, "undecodable reading");
                    report.malformed += 1;
                    continue;
                };

                if self.registry.apply_update(&block.serial, value) {
                    report.applied += 1;
                } else {
                    report.ignored += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{AirQuality, CapabilitySet, DeviceIdentity, MacAddress};
    use crate::sink::{DeviceStateSink, NullSink};
    use serde_json::json;

    fn reconciler(metrics: &[&str]) -> (PollingReconciler, Arc<DeviceRegistry>) {
        let registry = Arc::new(DeviceRegistry::new());
        registry.upsert(
            DeviceIdentity::new("S1", MacAddress::new("aa:01"), "MT10", None),
            &CapabilitySet::from_metrics(metrics),
            |_| -> Arc<dyn DeviceStateSink> { Arc::new(NullSink) },
        );
        let client =
            MerakiClient::from_reqwest("http://127.0.0.1:9/api/v1", reqwest::Client::new(), "1")
                .unwrap();
        (
            PollingReconciler::new(Arc::new(client), Arc::clone(&registry), "N_1"),
            registry,
        )
    }

    fn blocks(value: serde_json::Value) -> Vec<SensorReadings> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn water_reading_dropped_for_climate_sensor() {
        let (poller, registry) = reconciler(&["temperature", "humidity"]);

        let report = poller.apply(&blocks(json!([{
            "serial": "S1",
            "readings": [
                { "metric": "temperature", "temperature": { "celsius": 4.5 } },
                { "metric": "water", "water": { "present": true } },
            ]
        }])));

        assert_eq!(report.applied, 1);
        assert_eq!(report.ignored, 1);
        let state = registry.lookup("S1").unwrap().state();
        assert_eq!(state.temperature, Some(4.5));
        assert_eq!(state.flooded, None);
    }

    #[test]
    fn unknown_device_and_metric_are_skipped() {
        let (poller, _) = reconciler(&["indoorAirQuality"]);

        let report = poller.apply(&blocks(json!([
            { "serial": "S404", "readings": [
                { "metric": "indoorAirQuality", "indoorAirQuality": { "score": 85 } }
            ]},
            { "serial": "S1", "readings": [
                { "metric": "noise", "noise": { "ambient": { "level": 33 } } },
                { "metric": "indoorAirQuality", "indoorAirQuality": { "score": 85 } },
                { "indoorAirQuality": { "score": 85 } },
            ]}
        ])));

        assert_eq!(
            report,
            PollReport {
                devices: 1,
                unknown_devices: 1,
                applied: 1,
                ignored: 1,
                malformed: 1,
            }
        );
    }

    #[test]
    fn malformed_reading_does_not_spoil_its_neighbours() {
        let (poller, registry) = reconciler(&["temperature", "humidity"]);

        let report = poller.apply(&blocks(json!([{
            "serial": "S1",
            "readings": [
                { "ts": "2024-01-01T00:00:00Z", "metric": "temperature", "temperature": { "celsius": 21.5 } },
                { "ts": 1_704_067_200, "metric": "humidity", "humidity": { "relativePercentage": 40 } },
                { "metric": ["humidity"], "humidity": { "relativePercentage": 41 } },
                42,
            ]
        }])));

        assert_eq!(report.applied, 2);
        assert_eq!(report.malformed, 2);
        let state = registry.lookup("S1").unwrap().state();
        assert_eq!(state.temperature, Some(21.5));
        assert_eq!(state.humidity, Some(40.0));
    }

    #[test]
    fn air_quality_score_is_classified() {
        let (poller, registry) = reconciler(&["indoorAirQuality"]);
        poller.apply(&blocks(json!([{
            "serial": "S1",
            "readings": [{ "metric": "indoorAirQuality", "indoorAirQuality": { "score": 85 } }]
        }])));
        assert_eq!(
            registry.lookup("S1").unwrap().state().air_quality,
            Some(AirQuality::Good)
        );
    }
}
