// ── Device registry ──
//
// Concurrent map from serial number to per-device canonical state, with a
// secondary index by hardware address for the push feed. Entries are
// created by discovery and never removed for the lifetime of the process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::model::{AttributeValue, CanonicalState, CapabilitySet, DeviceIdentity, MacAddress};
use crate::sink::{DeviceManifest, DeviceStateSink};

// ── RegistryEntry ───────────────────────────────────────────────────

/// One registered device.
///
/// The mutable part sits behind a per-entry mutex. The state sink is
/// called while that mutex is held, so the order in which a sink sees
/// updates is the order in which the state changed.
pub struct RegistryEntry {
    serial: String,
    sink: Arc<dyn DeviceStateSink>,
    data: Mutex<EntryData>,
}

struct EntryData {
    identity: DeviceIdentity,
    capabilities: CapabilitySet,
    state: CanonicalState,
    updated_at: Option<DateTime<Utc>>,
}

impl RegistryEntry {
    fn lock(&self) -> MutexGuard<'_, EntryData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.lock().identity.clone()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.lock().capabilities.clone()
    }

    pub fn state(&self) -> CanonicalState {
        self.lock().state.clone()
    }

    pub fn manifest(&self) -> DeviceManifest {
        let data = self.lock();
        DeviceManifest::new(&data.identity, &data.capabilities)
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let data = self.lock();
        DeviceSnapshot {
            identity: data.identity.clone(),
            capabilities: data.capabilities.clone(),
            state: data.state.clone(),
            updated_at: data.updated_at,
        }
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    #[serde(flatten)]
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    pub state: CanonicalState,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Outcome of [`DeviceRegistry::upsert`].
#[derive(Debug, Clone)]
pub struct Upserted {
    pub entry: Arc<RegistryEntry>,
    pub created: bool,
    /// Hardware address the entry carried before this upsert, if it changed.
    pub previous_mac: Option<MacAddress>,
}

// ── DeviceRegistry ──────────────────────────────────────────────────

/// Explicitly owned registry shared by discovery and both feeds.
pub struct DeviceRegistry {
    by_serial: DashMap<String, Arc<RegistryEntry>>,
    serial_by_mac: DashMap<MacAddress, String>,
    version: watch::Sender<u64>,
    last_poll: watch::Sender<Option<DateTime<Utc>>>,
    last_push: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (last_poll, _) = watch::channel(None);
        let (last_push, _) = watch::channel(None);

        Self {
            by_serial: DashMap::new(),
            serial_by_mac: DashMap::new(),
            version,
            last_poll,
            last_push,
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Create or refresh the entry for `identity.serial`.
    ///
    /// A new serial gets a fresh entry whose sink comes from `make_sink`;
    /// a new serial with an empty capability set is rejected and `None` is
    /// returned. A known serial gets its identity replaced and its
    /// capability set unioned with `capabilities`. Canonical state is
    /// never touched here.
    pub fn upsert<F>(
        &self,
        identity: DeviceIdentity,
        capabilities: &CapabilitySet,
        make_sink: F,
    ) -> Option<Upserted>
    where
        F: FnOnce(&DeviceManifest) -> Arc<dyn DeviceStateSink>,
    {
        let serial = identity.serial.clone();
        let mac = identity.mac.clone();

        let (entry, created, previous_mac) = match self.by_serial.entry(serial.clone()) {
            Entry::Occupied(occupied) => {
                let entry = Arc::clone(occupied.get());
                drop(occupied);

                let mut data = entry.lock();
                let previous_mac = (data.identity.mac != mac).then(|| data.identity.mac.clone());
                data.capabilities.merge(capabilities);
                data.identity = identity;
                drop(data);

                (entry, false, previous_mac)
            }
            Entry::Vacant(vacant) => {
                if capabilities.is_empty() {
                    debug!(serial = %serial, "not registering device without capabilities");
                    return None;
                }
                let manifest = DeviceManifest::new(&identity, capabilities);
                let entry = Arc::new(RegistryEntry {
                    serial: serial.clone(),
                    sink: make_sink(&manifest),
                    data: Mutex::new(EntryData {
                        identity,
                        capabilities: capabilities.clone(),
                        state: CanonicalState::default(),
                        updated_at: None,
                    }),
                });
                vacant.insert(Arc::clone(&entry));
                (entry, true, None)
            }
        };

        if let Some(ref old) = previous_mac {
            self.serial_by_mac.remove_if(old, |_, s| *s == serial);
        }
        self.serial_by_mac.insert(mac, serial);
        self.bump_version();

        Some(Upserted {
            entry,
            created,
            previous_mac,
        })
    }

    /// Apply one canonical attribute update.
    ///
    /// Returns `false` without side effects when the device is unknown or
    /// lacks the capability the attribute belongs to.
    pub fn apply_update(&self, serial: &str, value: AttributeValue) -> bool {
        let Some(entry) = self.lookup(serial) else {
            trace!(serial, attribute = value.name(), "update for unregistered device");
            return false;
        };

        {
            let mut data = entry.lock();
            if !data.capabilities.contains(value.capability()) {
                debug!(
                    serial,
                    attribute = value.name(),
                    capability = %value.capability(),
                    "update for capability the device does not have"
                );
                return false;
            }
            data.state.apply(value);
            data.updated_at = Some(Utc::now());
            entry.sink.set_attribute(&value);
        }

        self.bump_version();
        true
    }

    /// Record completion of a polling cycle.
    pub fn mark_polled(&self) {
        self.last_poll.send_replace(Some(Utc::now()));
    }

    /// Record receipt of a push message.
    pub fn mark_pushed(&self) {
        self.last_push.send_replace(Some(Utc::now()));
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn lookup(&self, serial: &str) -> Option<Arc<RegistryEntry>> {
        self.by_serial.get(serial).map(|r| Arc::clone(r.value()))
    }

    pub fn lookup_by_mac(&self, mac: &MacAddress) -> Option<Arc<RegistryEntry>> {
        let serial = self.serial_by_mac.get(mac).map(|r| r.value().clone())?;
        self.lookup(&serial)
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.by_serial.contains_key(serial)
    }

    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }

    /// Copy of every entry, ordered by serial.
    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        let entries: Vec<Arc<RegistryEntry>> =
            self.by_serial.iter().map(|r| Arc::clone(r.value())).collect();
        let mut snapshots: Vec<DeviceSnapshot> = entries.iter().map(|e| e.snapshot()).collect();
        snapshots.sort_by(|a, b| a.identity.serial.cmp(&b.identity.serial));
        snapshots
    }

    /// Current change version.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Subscribe to the change version, bumped on every effective mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        *self.last_poll.borrow()
    }

    pub fn last_push(&self) -> Option<DateTime<Utc>> {
        *self.last_push.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn bump_version(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}
