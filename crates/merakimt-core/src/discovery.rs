// ── Discovery ──
//
// Fetches the sensor inventory, classifies each device, announces the
// change set to the catalog, and registers devices. Registration is
// additive: devices missing from a later inventory keep their entries.

use std::sync::Arc;

use merakimt_api::push::subscription_filter;
use merakimt_api::{MerakiClient, SensorDevice};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{CapabilitySet, DeviceIdentity, MacAddress};
use crate::sink::{ChangeKind, DeviceCatalog, DeviceChangeSet, DeviceManifest};
use crate::store::DeviceRegistry;

/// Summary of one discovery cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Push-feed subscription filters for every device in the change set.
    pub topics: Vec<String>,
    /// Filters for hardware addresses no registered device uses any more.
    pub stale_topics: Vec<String>,
}

pub struct DiscoveryCoordinator {
    client: Arc<MerakiClient>,
    registry: Arc<DeviceRegistry>,
    catalog: Arc<dyn DeviceCatalog>,
    network_id: String,
}

impl DiscoveryCoordinator {
    pub fn new(
        client: Arc<MerakiClient>,
        registry: Arc<DeviceRegistry>,
        catalog: Arc<dyn DeviceCatalog>,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            registry,
            catalog,
            network_id: network_id.into(),
        }
    }

    /// Fetch the inventory and reconcile it into the registry.
    ///
    /// Nothing is mutated unless the whole inventory response decoded.
    pub async fn run_once(&self) -> Result<DiscoveryReport, CoreError> {
        let devices = self.client.list_sensor_devices(&self.network_id).await?;
        debug!(count = devices.len(), "fetched sensor inventory");
        self.reconcile(&devices)
    }

    /// Reconcile an already-fetched inventory.
    ///
    /// The catalog sees the change set before any entry is created, so a
    /// state sink is never handed updates for a device the catalog has not
    /// been told about.
    pub fn reconcile(&self, devices: &[SensorDevice]) -> Result<DiscoveryReport, CoreError> {
        let mut report = DiscoveryReport::default();
        let mut changes = DeviceChangeSet::new();
        let mut pending: Vec<(DeviceIdentity, CapabilitySet)> = Vec::new();
        let mut retired: Vec<MacAddress> = Vec::new();

        for device in devices {
            if !device.is_sensor() {
                debug!(serial = %device.serial, product_type = ?device.product_type, "skipping non-sensor device");
                report.skipped += 1;
                continue;
            }

            let identity = DeviceIdentity::from(device);
            let discovered = CapabilitySet::from(device);

            let existing = self.registry.lookup(&identity.serial);
            if discovered.is_empty() && existing.is_none() {
                info!(serial = %identity.serial, model = %identity.model, "no supported metrics, skipping");
                report.skipped += 1;
                continue;
            }

            let (kind, merged) = match existing {
                Some(entry) => (ChangeKind::Updated, entry.capabilities().union(&discovered)),
                None => (ChangeKind::Added, discovered),
            };

            match kind {
                ChangeKind::Added => report.added += 1,
                ChangeKind::Updated => report.updated += 1,
            }
            changes.push(kind, DeviceManifest::new(&identity, &merged));
            pending.push((identity, merged));
        }

        if !changes.is_empty() {
            self.catalog.devices_changed(&changes)?;
        }

        for (identity, capabilities) in pending {
            report
                .topics
                .push(subscription_filter(&self.network_id, identity.mac.as_str()));
            let catalog = Arc::clone(&self.catalog);
            let previous_mac = self
                .registry
                .upsert(identity, &capabilities, |manifest| catalog.state_sink(manifest))
                .and_then(|upserted| upserted.previous_mac);
            if let Some(mac) = previous_mac {
                retired.push(mac);
            }
        }

        for mac in retired {
            if self.registry.lookup_by_mac(&mac).is_none() {
                debug!(mac = %mac, "hardware address retired");
                report
                    .stale_topics
                    .push(subscription_filter(&self.network_id, mac.as_str()));
            }
        }

        info!(
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            "discovery complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::Capability;
    use crate::sink::{DeviceStateSink, NullSink};
    use serde_json::json;

    #[derive(Default)]
    struct RecordingCatalog {
        changes: Mutex<Vec<DeviceChangeSet>>,
        sinks: Mutex<Vec<String>>,
    }

    impl DeviceCatalog for RecordingCatalog {
        fn devices_changed(&self, changes: &DeviceChangeSet) -> Result<(), CoreError> {
            self.changes.lock().unwrap().push(changes.clone());
            Ok(())
        }

        fn state_sink(&self, manifest: &DeviceManifest) -> Arc<dyn DeviceStateSink> {
            self.sinks.lock().unwrap().push(manifest.native_id.clone());
            Arc::new(NullSink)
        }
    }

    fn coordinator(catalog: Arc<RecordingCatalog>) -> (DiscoveryCoordinator, Arc<DeviceRegistry>) {
        let client =
            MerakiClient::from_reqwest("http://127.0.0.1:9/api/v1", reqwest::Client::new(), "1")
                .unwrap();
        let registry = Arc::new(DeviceRegistry::new());
        let coordinator =
            DiscoveryCoordinator::new(Arc::new(client), Arc::clone(&registry), catalog, "N_1");
        (coordinator, registry)
    }

    fn device(serial: &str, mac: &str, metrics: &[&str]) -> SensorDevice {
        serde_json::from_value(json!({
            "serial": serial,
            "mac": mac,
            "model": "MT10",
            "productType": "sensor",
            "sensor": { "metrics": metrics }
        }))
        .unwrap()
    }

    #[test]
    fn new_devices_are_added_and_announced() {
        let catalog = Arc::new(RecordingCatalog::default());
        let (coordinator, registry) = coordinator(Arc::clone(&catalog));

        let report = coordinator
            .reconcile(&[
                device("S1", "aa:bb:cc:00:00:01", &["temperature", "humidity"]),
                device("S2", "aa:bb:cc:00:00:02", &["battery"]),
            ])
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.topics, ["meraki/v1/mt/N_1/ble/AA:BB:CC:00:00:01/+"]);
        assert!(registry.contains("S1"));
        assert!(!registry.contains("S2"));

        let changes = catalog.changes.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].count(ChangeKind::Added), 1);
        assert_eq!(*catalog.sinks.lock().unwrap(), ["S1"]);
    }

    #[test]
    fn rediscovery_updates_without_new_sink() {
        let catalog = Arc::new(RecordingCatalog::default());
        let (coordinator, registry) = coordinator(Arc::clone(&catalog));

        coordinator
            .reconcile(&[device("S1", "aa:01", &["temperature"])])
            .unwrap();
        let report = coordinator
            .reconcile(&[device("S1", "aa:01", &["temperature", "water"])])
            .unwrap();

        assert_eq!(report.added, 0);
        assert_eq!(report.updated, 1);
        assert_eq!(catalog.sinks.lock().unwrap().len(), 1);

        let changes = catalog.changes.lock().unwrap();
        let last = changes.last().unwrap().iter().next().unwrap();
        assert_eq!(last.kind, ChangeKind::Updated);
        assert_eq!(last.manifest.interfaces, ["Thermometer", "FloodSensor", "Battery"]);
        assert!(
            registry
                .lookup("S1")
                .unwrap()
                .capabilities()
                .contains(Capability::FloodSensor)
        );
    }

    #[test]
    fn changed_mac_retires_old_filter() {
        let catalog = Arc::new(RecordingCatalog::default());
        let (coordinator, registry) = coordinator(Arc::clone(&catalog));

        coordinator
            .reconcile(&[device("S1", "aa:bb:cc:00:00:01", &["temperature"])])
            .unwrap();
        let report = coordinator
            .reconcile(&[device("S1", "aa:bb:cc:00:00:09", &["temperature"])])
            .unwrap();

        assert_eq!(report.topics, ["meraki/v1/mt/N_1/ble/AA:BB:CC:00:00:09/+"]);
        assert_eq!(
            report.stale_topics,
            ["meraki/v1/mt/N_1/ble/AA:BB:CC:00:00:01/+"]
        );
        assert!(
            registry
                .lookup_by_mac(&MacAddress::new("aa:bb:cc:00:00:01"))
                .is_none()
        );

        let again = coordinator
            .reconcile(&[device("S1", "aa:bb:cc:00:00:09", &["temperature"])])
            .unwrap();
        assert!(again.stale_topics.is_empty());
    }

    #[test]
    fn non_sensor_descriptors_are_skipped() {
        let catalog = Arc::new(RecordingCatalog::default());
        let (coordinator, registry) = coordinator(Arc::clone(&catalog));

        let mut ap = device("Q2-AP", "aa:ff", &["temperature"]);
        ap.product_type = Some("wireless".into());

        let report = coordinator.reconcile(&[ap]).unwrap();
        assert_eq!(report.skipped, 1);
        assert!(registry.is_empty());
        assert!(catalog.changes.lock().unwrap().is_empty());
    }
}
