// ── API-to-domain type conversions ──
//
// Bridges raw `merakimt_api` wire types into canonical domain types.

use merakimt_api::SensorDevice;

use crate::model::{CapabilitySet, DeviceIdentity, MacAddress};

impl From<&SensorDevice> for DeviceIdentity {
    fn from(d: &SensorDevice) -> Self {
        DeviceIdentity::new(
            d.serial.clone(),
            MacAddress::new(&d.mac),
            d.model.clone(),
            d.name.clone(),
        )
    }
}

impl From<&SensorDevice> for CapabilitySet {
    fn from(d: &SensorDevice) -> Self {
        CapabilitySet::from_metrics(d.metrics())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Capability;
    use serde_json::json;

    #[test]
    fn sensor_device_to_identity_and_caps() {
        let device: SensorDevice = serde_json::from_value(json!({
            "serial": "Q3CA-0001",
            "mac": "AA:BB:CC:00:00:01",
            "model": "MT12",
            "name": null,
            "productType": "sensor",
            "sensor": { "metrics": ["water", "battery"] }
        }))
        .unwrap();

        let identity = DeviceIdentity::from(&device);
        assert_eq!(identity.name, "Q3CA-0001");
        assert_eq!(identity.mac.as_str(), "aa:bb:cc:00:00:01");

        let caps = CapabilitySet::from(&device);
        assert_eq!(caps.len(), 2);
        assert!(caps.contains(Capability::FloodSensor));
    }
}
