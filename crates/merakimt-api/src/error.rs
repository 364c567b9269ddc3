use thiserror::Error;

/// Top-level error type for the `merakimt-api` crate.
///
/// Covers every failure mode across both feeds: the Dashboard REST API
/// and the MQTT telemetry broker. `merakimt-core` maps these into
/// domain-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// API key missing, revoked, or lacking access to the organization.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Rate limited by the Dashboard API. Includes retry-after in seconds.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Dashboard API ───────────────────────────────────────────────
    /// Non-success response from the Dashboard API.
    #[error("Dashboard API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── MQTT ────────────────────────────────────────────────────────
    /// The broker address could not be turned into connection options.
    #[error("Invalid MQTT broker address '{url}': {reason}")]
    InvalidBrokerUrl { url: String, reason: String },

    /// The MQTT client request queue rejected a request.
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}
