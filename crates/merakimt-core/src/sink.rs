// ── Downstream collaborators ──
//
// The engine announces devices to a catalog and forwards every accepted
// attribute update to a per-device state sink. Both are synchronous and
// must not block: they are called from reconciliation tasks, and the
// state sink runs while the device's entry lock is held.

use std::sync::Arc;

use serde::Serialize;
use strum::Display;

use crate::error::CoreError;
use crate::model::{AttributeValue, CapabilitySet, DeviceIdentity};

pub const MANUFACTURER: &str = "Cisco Meraki";
pub const DEVICE_TYPE: &str = "sensor";

// ── Manifest ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub serial_number: String,
}

/// Catalog record describing one device and its interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceManifest {
    pub native_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub info: DeviceInfo,
    pub interfaces: Vec<String>,
}

impl DeviceManifest {
    pub fn new(identity: &DeviceIdentity, capabilities: &CapabilitySet) -> Self {
        Self {
            native_id: identity.serial.clone(),
            name: identity.name.clone(),
            device_type: DEVICE_TYPE.to_owned(),
            info: DeviceInfo {
                model: identity.model.clone(),
                manufacturer: MANUFACTURER.to_owned(),
                serial_number: identity.serial.clone(),
            },
            interfaces: capabilities.names(),
        }
    }
}

// ── Change sets ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceChange {
    pub kind: ChangeKind,
    pub manifest: DeviceManifest,
}

/// Ordered list of catalog changes produced by one discovery cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviceChangeSet(Vec<DeviceChange>);

impl DeviceChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ChangeKind, manifest: DeviceManifest) {
        self.0.push(DeviceChange { kind, manifest });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceChange> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.0.iter().filter(|c| c.kind == kind).count()
    }
}

impl<'a> IntoIterator for &'a DeviceChangeSet {
    type Item = &'a DeviceChange;
    type IntoIter = std::slice::Iter<'a, DeviceChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Traits ──────────────────────────────────────────────────────────

/// Receives canonical attribute updates for one device.
pub trait DeviceStateSink: Send + Sync {
    fn set_attribute(&self, value: &AttributeValue);
}

/// Receives device announcements and hands out per-device state sinks.
pub trait DeviceCatalog: Send + Sync {
    /// Called once per discovery cycle with every added or updated device.
    fn devices_changed(&self, changes: &DeviceChangeSet) -> Result<(), CoreError>;

    /// Called once per device, on its first sighting.
    fn state_sink(&self, manifest: &DeviceManifest) -> Arc<dyn DeviceStateSink>;
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DeviceStateSink for NullSink {
    fn set_attribute(&self, _value: &AttributeValue) {}
}

/// Catalog that accepts every change and hands out [`NullSink`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCatalog;

impl DeviceCatalog for NullCatalog {
    fn devices_changed(&self, _changes: &DeviceChangeSet) -> Result<(), CoreError> {
        Ok(())
    }

    fn state_sink(&self, _manifest: &DeviceManifest) -> Arc<dyn DeviceStateSink> {
        Arc::new(NullSink)
    }
}
