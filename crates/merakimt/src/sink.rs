//! Device catalog and state sinks used by `merakimt run`.
//!
//! `LogCatalog` reports through `tracing`; `JsonLinesCatalog` writes one
//! JSON object per event to a shared writer (stdout in practice).

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use merakimt_core::{
    AttributeValue, CoreError, DeviceCatalog, DeviceChangeSet, DeviceManifest, DeviceStateSink,
};

// ── Tracing sink ─────────────────────────────────────────────────────

/// Target of catalog and state events, enabled at `info` regardless of `-v`.
pub const STATE_TARGET: &str = "merakimt::state";

#[derive(Debug, Default)]
pub struct LogCatalog;

impl DeviceCatalog for LogCatalog {
    fn devices_changed(&self, changes: &DeviceChangeSet) -> Result<(), CoreError> {
        for change in changes {
            info!(
                target: STATE_TARGET,
                serial = %change.manifest.native_id,
                name = %change.manifest.name,
                model = %change.manifest.info.model,
                interfaces = %change.manifest.interfaces.join(","),
                change = %change.kind,
                "device catalog updated"
            );
        }
        Ok(())
    }

    fn state_sink(&self, manifest: &DeviceManifest) -> Arc<dyn DeviceStateSink> {
        Arc::new(LogSink {
            serial: manifest.native_id.clone(),
        })
    }
}

struct LogSink {
    serial: String,
}

impl DeviceStateSink for LogSink {
    fn set_attribute(&self, value: &AttributeValue) {
        info!(
            target: STATE_TARGET,
            serial = %self.serial,
            attribute = value.name(),
            ?value,
            "state updated"
        );
    }
}

// ── JSON-lines sink ──────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum Event<'a> {
    DevicesChanged {
        at: DateTime<Utc>,
        changes: &'a DeviceChangeSet,
    },
    #[serde(rename_all = "camelCase")]
    StateUpdated {
        at: DateTime<Utc>,
        native_id: &'a str,
        update: &'a AttributeValue,
    },
}

type SharedWriter<W> = Arc<Mutex<W>>;

fn emit<W: Write>(writer: &Mutex<W>, event: &Event<'_>) {
    let line = match serde_json::to_string(event) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "failed to encode sink event");
            return;
        }
    };
    let mut out = writer.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
        warn!(error = %e, "failed to write sink event");
    }
}

pub struct JsonLinesCatalog<W> {
    writer: SharedWriter<W>,
}

impl<W: Write> JsonLinesCatalog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }
}

impl<W: Write + Send + 'static> DeviceCatalog for JsonLinesCatalog<W> {
    fn devices_changed(&self, changes: &DeviceChangeSet) -> Result<(), CoreError> {
        emit(
            &self.writer,
            &Event::DevicesChanged {
                at: Utc::now(),
                changes,
            },
        );
        Ok(())
    }

    fn state_sink(&self, manifest: &DeviceManifest) -> Arc<dyn DeviceStateSink> {
        Arc::new(JsonLinesSink {
            native_id: manifest.native_id.clone(),
            writer: Arc::clone(&self.writer),
        })
    }
}

struct JsonLinesSink<W> {
    native_id: String,
    writer: SharedWriter<W>,
}

impl<W: Write + Send> DeviceStateSink for JsonLinesSink<W> {
    fn set_attribute(&self, value: &AttributeValue) {
        emit(
            &self.writer,
            &Event::StateUpdated {
                at: Utc::now(),
                native_id: &self.native_id,
                update: value,
            },
        );
    }
}
