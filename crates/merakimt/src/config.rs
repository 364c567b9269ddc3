//! Effective configuration: config file + environment, then CLI flags.

use std::path::PathBuf;

use merakimt_config::{self as config_store, Config};
use merakimt_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file this invocation reads and writes.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(config_store::config_path)
}

/// Load file + environment and apply command-line overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_path(global);
    let mut cfg =
        config_store::load_config_from(&path).map_err(|e| CliError::from_config(e, &path))?;
    apply_overrides(&mut cfg, global);
    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref org_id) = global.org_id {
        cfg.org_id.clone_from(org_id);
    }
    if let Some(ref network_id) = global.network_id {
        cfg.network_id.clone_from(network_id);
    }
    if let Some(ref broker) = global.broker {
        cfg.mqtt_broker.clone_from(broker);
    }
    if global.no_push {
        cfg.mqtt_broker.clear();
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
}

/// Build the controller configuration, resolving the API key.
pub fn controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load(global)?;
    config_store::to_controller_config(&cfg)
        .map_err(|e| CliError::from_config(e, &config_path(global)))
}
