//! Config subcommand handlers.

use std::io::BufRead;

use merakimt_config::{self as config_store, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Copy of `cfg` that is safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some(REDACTED.into());
    }
    shown
}

fn to_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# config could not be rendered: {e}"))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            let out = output::render_single(&global.output, &cfg, to_toml, |_| {
                path.display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { api_key_env, force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let mut cfg = config::load(global)?;
            // Secrets go to the keyring or an env var, never into a fresh file.
            cfg.api_key = None;
            if api_key_env.is_some() {
                cfg.api_key_env = api_key_env;
            }

            config_store::save_config_to(&cfg, &path)
                .map_err(|e| CliError::from_config(e, &path))?;
            output::print_output(&path.display().to_string(), global.quiet);
            if !global.quiet && cfg.api_key_env.is_none() {
                eprintln!("Store the Dashboard API key with: merakimt config set-key");
            }
            Ok(())
        }

        // ── Set-key ─────────────────────────────────────────────────
        ConfigCommand::SetKey => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let key = line.trim();
            if key.is_empty() {
                return Err(CliError::Validation {
                    field: "api_key".into(),
                    reason: "no key read from stdin".into(),
                    path: path.display().to_string(),
                });
            }

            config_store::store_api_key(key).map_err(|e| CliError::from_config(e, &path))?;
            if !global.quiet {
                eprintln!("API key stored in the system keyring");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_hides_plaintext_key_only() {
        let cfg = Config {
            api_key: Some("0123456789abcdef".into()),
            api_key_env: Some("MERAKI_KEY".into()),
            ..Config::default()
        };
        let shown = redacted(&cfg);
        assert_eq!(shown.api_key.as_deref(), Some(REDACTED));
        assert_eq!(shown.api_key_env.as_deref(), Some("MERAKI_KEY"));

        let rendered = to_toml(&shown);
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(redacted(&Config::default()).api_key.is_none());
    }
}
