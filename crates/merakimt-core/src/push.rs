// ── Push reconciler ──
//
// Single dispatcher for every device's telemetry messages. Messages arrive
// on one channel in broker order, so per-device ordering is preserved.

use std::sync::Arc;

use merakimt_api::PushMessage;
use merakimt_api::push::parse_topic;
use serde_json::Value;
use strum::Display;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::model::MacAddress;
use crate::normalize::{Feed, is_known_metric, normalize};
use crate::store::DeviceRegistry;

/// What happened to one push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PushOutcome {
    Applied,
    /// Unknown metric, unknown device, or capability mismatch.
    Ignored,
    /// Bad topic, unparseable payload, or missing field.
    Malformed,
}

pub struct PushReconciler {
    registry: Arc<DeviceRegistry>,
}

impl PushReconciler {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// Decode and apply one message.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> PushOutcome {
        self.registry.mark_pushed();

        let Some(parsed) = parse_topic(topic) else {
            warn!(topic, feed = %Feed::Push, "unexpected topic shape");
            return PushOutcome::Malformed;
        };
        let metric = parsed.metric.as_str();

        if !is_known_metric(metric) {
            trace!(topic, metric, "unknown metric");
            return PushOutcome::Ignored;
        }

        let body: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(topic, error = %e, feed = %Feed::Push, "payload is not valid JSON");
                return PushOutcome::Malformed;
            }
        };

        let Some(value) = normalize(metric, &body) else {
            debug!(topic, metric, feed = %Feed::Push, "payload lacks expected field");
            return PushOutcome::Malformed;
        };

        let mac = MacAddress::new(&parsed.mac);
        let Some(entry) = self.registry.lookup_by_mac(&mac) else {
            trace!(mac = %mac, metric, "message for unregistered device");
            return PushOutcome::Ignored;
        };

        if self.registry.apply_update(entry.serial(), value) {
            trace!(serial = entry.serial(), attribute = value.name(), "push update applied");
            PushOutcome::Applied
        } else {
            PushOutcome::Ignored
        }
    }

    /// Drain the message channel until it closes or `cancel` fires.
    pub async fn run(self, mut rx: mpsc::Receiver<PushMessage>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    self.handle_message(&message.topic, &message.payload);
                }
            }
        }
        debug!("push dispatcher exiting");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{AirQuality, CapabilitySet, DeviceIdentity};
    use crate::sink::{DeviceStateSink, NullSink};

    const TOPIC_BASE: &str = "meraki/v1/mt/N_1/ble/AA:BB:CC:DD:EE:FF";

    fn reconciler(metrics: &[&str]) -> (PushReconciler, Arc<DeviceRegistry>) {
        let registry = Arc::new(DeviceRegistry::new());
        registry.upsert(
            DeviceIdentity::new("S1", MacAddress::new("aa:bb:cc:dd:ee:ff"), "MT14", None),
            &CapabilitySet::from_metrics(metrics),
            |_| -> Arc<dyn DeviceStateSink> { Arc::new(NullSink) },
        );
        (PushReconciler::new(Arc::clone(&registry)), registry)
    }

    #[test]
    fn iaq_index_maps_to_poor() {
        let (push, registry) = reconciler(&["indoorAirQuality"]);
        let outcome = push.handle_message(&format!("{TOPIC_BASE}/iaqIndex"), br#"{"iaqIndex":45}"#);

        assert_eq!(outcome, PushOutcome::Applied);
        assert_eq!(
            registry.lookup("S1").unwrap().state().air_quality,
            Some(AirQuality::Poor)
        );
        assert!(registry.last_push().is_some());
    }

    #[test]
    fn door_and_battery_updates() {
        let (push, registry) = reconciler(&["door"]);
        assert_eq!(
            push.handle_message(&format!("{TOPIC_BASE}/door"), br#"{"open":true}"#),
            PushOutcome::Applied
        );
        assert_eq!(
            push.handle_message(
                &format!("{TOPIC_BASE}/batteryPercentage"),
                br#"{"batteryPercentage":77}"#
            ),
            PushOutcome::Applied
        );
        let state = registry.lookup("S1").unwrap().state();
        assert_eq!(state.binary_state, Some(true));
        assert_eq!(state.battery_level, Some(77.0));
    }

    #[test]
    fn malformed_messages_are_dropped() {
        let (push, registry) = reconciler(&["temperature"]);
        assert_eq!(
            push.handle_message("meraki/v1/mt/N_1/ble", b"{}"),
            PushOutcome::Malformed
        );
        assert_eq!(
            push.handle_message(&format!("{TOPIC_BASE}/temperature"), b"not json"),
            PushOutcome::Malformed
        );
        assert_eq!(
            push.handle_message(&format!("{TOPIC_BASE}/temperature"), br#"{"fahrenheit":70}"#),
            PushOutcome::Malformed
        );
        assert_eq!(registry.lookup("S1").unwrap().state().temperature, None);
    }

    #[test]
    fn unknown_device_metric_or_capability_is_ignored() {
        let (push, _) = reconciler(&["temperature"]);
        assert_eq!(
            push.handle_message(
                "meraki/v1/mt/N_1/ble/00:00:00:00:00:00/temperature",
                br#"{"celsius":20}"#
            ),
            PushOutcome::Ignored
        );
        assert_eq!(
            push.handle_message(&format!("{TOPIC_BASE}/noise"), br#"{"level":20}"#),
            PushOutcome::Ignored
        );
        assert_eq!(
            push.handle_message(&format!("{TOPIC_BASE}/waterDetection"), br#"{"wet":true}"#),
            PushOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn run_drains_channel_until_closed() {
        let (push, registry) = reconciler(&["temperature"]);
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(push.run(rx, CancellationToken::new()));

        tx.send(PushMessage {
            topic: format!("{TOPIC_BASE}/temperature"),
            payload: bytes::Bytes::from_static(br#"{"celsius":18.5}"#),
        })
        .await
        .unwrap();
        tx.send(PushMessage {
            topic: format!("{TOPIC_BASE}/temperature"),
            payload: bytes::Bytes::from_static(br#"{"celsius":19.0}"#),
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(registry.lookup("S1").unwrap().state().temperature, Some(19.0));
    }
}
