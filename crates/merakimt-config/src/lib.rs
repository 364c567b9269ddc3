//! Configuration for the merakimt daemon.
//!
//! TOML file + `MERAKIMT_*` environment layering, API-key resolution
//! (env var, keyring, plaintext), and translation to
//! `merakimt_core::ControllerConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use merakimt_core::ControllerConfig;

const KEYRING_SERVICE: &str = "merakimt";
const KEYRING_USER: &str = "api-key";
const ENV_PREFIX: &str = "MERAKIMT_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured (set api_key_env, store one in the keyring, or set api_key)")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Dashboard API key (plaintext -- prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Name of an environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub org_id: String,

    #[serde(default)]
    pub network_id: String,

    /// Telemetry broker URL. Empty disables the push feed.
    #[serde(default = "default_mqtt_broker")]
    pub mqtt_broker: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path to an extra CA certificate for the Dashboard API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// HTTP request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Polling cadence, seconds. 0 disables periodic polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Rediscovery cadence, seconds. 0 means startup only.
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            org_id: String::new(),
            network_id: String::new(),
            mqtt_broker: default_mqtt_broker(),
            base_url: default_base_url(),
            ca_cert: None,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            discovery_interval: default_discovery_interval(),
        }
    }
}

fn default_mqtt_broker() -> String {
    "mqtt://localhost:1883".into()
}
fn default_base_url() -> String {
    merakimt_core::config::DEFAULT_BASE_URL.into()
}
fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    60
}
fn default_discovery_interval() -> u64 {
    600
}

impl Config {
    /// Check the fields the controller cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.org_id.trim().is_empty() {
            return Err(missing("org_id"));
        }
        if self.network_id.trim().is_empty() {
            return Err(missing("network_id"));
        }
        if self.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        url::Url::parse(&self.base_url).map_err(|e| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("{e}: {}", self.base_url),
        })?;
        if let Some(broker) = self.broker() {
            url::Url::parse(broker).map_err(|e| ConfigError::Validation {
                field: "mqtt_broker".into(),
                reason: format!("{e}: {broker}"),
            })?;
        }
        Ok(())
    }

    /// The broker URL, or `None` when the push feed is disabled.
    pub fn broker(&self) -> Option<&str> {
        Some(self.mqtt_broker.trim()).filter(|b| !b.is_empty())
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: "must be set".into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "merakimt", "merakimt").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("merakimt");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from `path` + environment. A missing file is not an
/// error; defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the API key: `api_key_env` variable, then system keyring, then
/// the plaintext `api_key`.
pub fn resolve_api_key(cfg: &Config) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = cfg.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = cfg.api_key {
        if !key.is_empty() {
            return Ok(SecretString::from(key.clone()));
        }
    }

    Err(ConfigError::NoCredentials)
}

/// Store the API key in the system keyring.
pub fn store_api_key(key: &str) -> Result<(), ConfigError> {
    let keyring_err = |e: keyring::Error| ConfigError::Validation {
        field: "keyring".into(),
        reason: e.to_string(),
    };
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(keyring_err)?;
    entry.set_password(key).map_err(keyring_err)
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate and build a `ControllerConfig`, resolving the API key.
pub fn to_controller_config(cfg: &Config) -> Result<ControllerConfig, ConfigError> {
    cfg.validate()?;
    let api_key = resolve_api_key(cfg)?;

    let mut controller = ControllerConfig::new(api_key, cfg.org_id.trim(), cfg.network_id.trim());
    controller.base_url.clone_from(&cfg.base_url);
    controller.mqtt_broker = cfg.broker().map(str::to_owned);
    controller.timeout = Duration::from_secs(cfg.timeout);
    controller.ca_cert.clone_from(&cfg.ca_cert);
    controller.poll_interval = Duration::from_secs(cfg.poll_interval);
    controller.discovery_interval = Duration::from_secs(cfg.discovery_interval);
    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.mqtt_broker, "mqtt://localhost:1883");
        assert_eq!(cfg.base_url, "https://api.meraki.com/api/v1/");
        assert_eq!(cfg.timeout, 10);
        assert_eq!(cfg.poll_interval, 60);
        assert_eq!(cfg.discovery_interval, 600);
    }

    #[test]
    fn validate_requires_ids() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "org_id"
        ));
        cfg.org_id = "1".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "network_id"
        ));
        cfg.network_id = "N_1".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_broker_disables_push() {
        let cfg = Config {
            mqtt_broker: "  ".into(),
            ..Config::default()
        };
        assert_eq!(cfg.broker(), None);
        assert_eq!(Config::default().broker(), Some("mqtt://localhost:1883"));
    }
}
