// ── Capabilities ──
//
// What a sensor can report, derived from the metric names it declares at
// discovery. Declaration order is the rendering order of interface lists.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A single reportable capability.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
)]
pub enum Capability {
    Thermometer,
    HumiditySensor,
    FloodSensor,
    BinarySensor,
    AirQualitySensor,
    #[strum(serialize = "PM25Sensor")]
    #[serde(rename = "PM25Sensor")]
    Pm25Sensor,
    #[strum(serialize = "VOCSensor")]
    #[serde(rename = "VOCSensor")]
    VocSensor,
    Battery,
}

impl Capability {
    /// Map a declared metric name to its capability.
    ///
    /// Only the inventory spellings count here; `battery` is not a
    /// capability source on its own.
    pub fn from_metric(metric: &str) -> Option<Self> {
        match metric {
            "temperature" => Some(Self::Thermometer),
            "humidity" => Some(Self::HumiditySensor),
            "water" => Some(Self::FloodSensor),
            "door" => Some(Self::BinarySensor),
            "indoorAirQuality" => Some(Self::AirQualitySensor),
            "pm25" => Some(Self::Pm25Sensor),
            "tvoc" => Some(Self::VocSensor),
            _ => None,
        }
    }
}

// ── CapabilitySet ───────────────────────────────────────────────────

/// Ordered set of capabilities for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a declared metric list.
    ///
    /// Unknown names are ignored. Battery is added only when at least one
    /// other capability matched, so a device declaring nothing usable
    /// yields an empty set.
    pub fn from_metrics<I, S>(metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: BTreeSet<Capability> = metrics
            .into_iter()
            .filter_map(|m| Capability::from_metric(m.as_ref()))
            .collect();
        if !set.is_empty() {
            set.insert(Capability::Battery);
        }
        Self(set)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Add every capability of `other`. Returns `true` if the set grew.
    pub fn merge(&mut self, other: &Self) -> bool {
        let before = self.0.len();
        self.0.extend(other.0.iter().copied());
        self.0.len() > before
    }

    /// Union of two sets.
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Capability names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|c| c.to_string()).collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn each_base_metric_adds_battery() {
        for metric in [
            "temperature",
            "humidity",
            "water",
            "door",
            "indoorAirQuality",
            "pm25",
            "tvoc",
        ] {
            let set = CapabilitySet::from_metrics([metric]);
            assert_eq!(set.len(), 2, "{metric}");
            assert!(set.contains(Capability::Battery), "{metric}");
        }
    }

    #[test]
    fn battery_alone_is_not_enough() {
        assert!(CapabilitySet::from_metrics(["battery"]).is_empty());
        assert!(CapabilitySet::from_metrics(Vec::<String>::new()).is_empty());
        assert!(CapabilitySet::from_metrics(["noise", "co2"]).is_empty());
    }

    #[test]
    fn names_follow_declaration_order() {
        let set = CapabilitySet::from_metrics(["tvoc", "door", "temperature"]);
        assert_eq!(
            set.names(),
            ["Thermometer", "BinarySensor", "VOCSensor", "Battery"]
        );
    }

    #[test]
    fn merge_never_removes() {
        let mut set = CapabilitySet::from_metrics(["temperature"]);
        let grew = set.merge(&CapabilitySet::from_metrics(["humidity"]));
        assert!(grew);
        assert!(set.contains(Capability::Thermometer));
        assert!(set.contains(Capability::HumiditySensor));
        assert!(!set.merge(&CapabilitySet::new()));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for cap in Capability::iter() {
            let parsed: Capability = cap.to_string().parse().unwrap_or(Capability::Battery);
            assert_eq!(parsed, cap);
        }
    }
}
