// ── Runtime controller configuration ──
//
// Describes how to reach the Dashboard API and the telemetry broker, and
// how often to run each cycle. Built by the binary from the config crate;
// core never reads config files.

use std::path::PathBuf;
use std::time::Duration;

pub use merakimt_api::DEFAULT_BASE_URL;
use merakimt_api::TransportConfig;
use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Dashboard API root (e.g. `https://api.meraki.com/api/v1/`).
    pub base_url: String,
    pub api_key: SecretString,
    pub org_id: String,
    pub network_id: String,
    /// Telemetry broker URL. `None` disables the push feed.
    pub mqtt_broker: Option<String>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Extra CA certificate (PEM) for the Dashboard API.
    pub ca_cert: Option<PathBuf>,
    /// Polling cadence. Zero disables periodic polling.
    pub poll_interval: Duration,
    /// Rediscovery cadence. Zero means discover at startup only.
    pub discovery_interval: Duration,
}

impl ControllerConfig {
    pub fn new(
        api_key: SecretString,
        org_id: impl Into<String>,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key,
            org_id: org_id.into(),
            network_id: network_id.into(),
            mqtt_broker: None,
            timeout: Duration::from_secs(10),
            ca_cert: None,
            poll_interval: Duration::from_secs(60),
            discovery_interval: Duration::from_secs(600),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            ca_cert: self.ca_cert.clone(),
        }
    }

    /// MQTT client id, unique per monitored network.
    pub(crate) fn mqtt_client_id(&self) -> String {
        format!("merakimt-{}", self.network_id)
    }
}
