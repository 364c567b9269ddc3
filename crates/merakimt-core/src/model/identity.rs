// ── Device identity types ──
//
// A sensor is keyed by its serial number. The hardware address is only
// used to derive and resolve push-feed topics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── MacAddress ──────────────────────────────────────────────────────

/// Hardware address, normalized to lowercase colon-separated format
/// (`aa:bb:cc:dd:ee:ff`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized address from any common format.
    /// Accepts colon-separated or dash-separated input in either case.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase().replace('-', ":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase rendering used in telemetry topics.
    pub fn topic_segment(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

// ── DeviceIdentity ──────────────────────────────────────────────────

/// Immutable identity of a discovered sensor.
///
/// Rediscovery replaces the whole record for the same serial; fields are
/// never patched individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub serial: String,
    pub mac: MacAddress,
    pub model: String,
    /// Display name. Falls back to the serial when the device is unnamed.
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(
        serial: impl Into<String>,
        mac: MacAddress,
        model: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        let serial = serial.into();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| serial.clone());
        Self {
            serial,
            mac,
            model: model.into(),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_normalizes_dashes_and_case() {
        let mac = MacAddress::new("AA-BB-CC-DD-EE-FF");
        assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(mac, MacAddress::new("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn mac_topic_segment_is_uppercase() {
        let mac = MacAddress::new("aa:bb:cc:dd:ee:ff");
        assert_eq!(mac.topic_segment(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn unnamed_device_uses_serial() {
        let id = DeviceIdentity::new("Q3CA-0001", MacAddress::new("aa:00"), "MT10", None);
        assert_eq!(id.name, "Q3CA-0001");

        let blank = DeviceIdentity::new("Q3CA-0002", MacAddress::new("aa:01"), "MT10", Some("  ".into()));
        assert_eq!(blank.name, "Q3CA-0002");

        let named = DeviceIdentity::new("Q3CA-0003", MacAddress::new("aa:02"), "MT10", Some("Lab".into()));
        assert_eq!(named.name, "Lab");
    }
}
