//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use merakimt_config::ConfigError;
use merakimt_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach {url}")]
    #[diagnostic(
        code(merakimt::connection_failed),
        help(
            "Check network access to the Dashboard API or the MQTT broker.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(merakimt::timeout),
        help("Increase the timeout with --timeout or the `timeout` config key.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(merakimt::auth_failed),
        help(
            "Verify the Dashboard API key and that it has access to the organization.\n\
             Store a new key with: merakimt config set-key"
        )
    )]
    AuthFailed { message: String },

    #[error("No API key configured")]
    #[diagnostic(
        code(merakimt::no_credentials),
        help(
            "Store one with: merakimt config set-key\n\
             Or set `api_key_env` in the config file to an environment variable holding it."
        )
    )]
    NoCredentials,

    // ── Resources ────────────────────────────────────────────────────

    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(merakimt::not_found),
        help("Run: merakimt devices to see discovered sensors")
    )]
    NotFound { identifier: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error(
        "Dashboard API error{}: {message}",
        .status.map_or_else(String::new, |s| format!(" ({s})"))
    )]
    #[diagnostic(code(merakimt::api_error))]
    ApiError { status: Option<u16>, message: String },

    // ── Unsupported ──────────────────────────────────────────────────

    #[error("Operation '{operation}' is not supported")]
    #[diagnostic(code(merakimt::unsupported), help("This requires {required}."))]
    Unsupported { operation: String, required: String },

    // ── Validation / configuration ───────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(merakimt::validation),
        help(
            "Set it in {path}, through MERAKIMT_* environment variables,\n\
             or with the matching command-line flag."
        )
    )]
    Validation {
        field: String,
        reason: String,
        path: String,
    },

    #[error("Configuration could not be loaded: {message}")]
    #[diagnostic(code(merakimt::config), help("Config file: {path}"))]
    Config { message: String, path: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(merakimt::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Runtime ──────────────────────────────────────────────────────

    #[error("Controller is not running")]
    #[diagnostic(code(merakimt::controller_stopped))]
    ControllerStopped,

    #[error("Internal error: {0}")]
    #[diagnostic(code(merakimt::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    #[diagnostic(code(merakimt::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    #[diagnostic(code(merakimt::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            _ => exit_code::GENERAL,
        }
    }

    /// Convert a config-layer error, pointing help text at `path`.
    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        let path = path.display().to_string();
        match err {
            ConfigError::Validation { field, reason } => Self::Validation {
                field,
                reason,
                path,
            },
            ConfigError::NoCredentials => Self::NoCredentials,
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
                path,
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::DeviceNotFound { identifier } => CliError::NotFound { identifier },
            CoreError::Unsupported {
                operation,
                required,
            } => CliError::Unsupported {
                operation,
                required,
            },
            CoreError::ControllerStopped => CliError::ControllerStopped,
            CoreError::Api { message, status } => CliError::ApiError { status, message },
            CoreError::Config { message } => CliError::Config {
                message,
                path: String::new(),
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
