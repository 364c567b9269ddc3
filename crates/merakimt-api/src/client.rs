// Async HTTP client for the Meraki Dashboard API (v1), sensor endpoints only.
//
// Base path: /api/v1/
// Auth: X-Cisco-Meraki-API-Key header

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::types::{SensorDevice, SensorReadings};

/// Public Dashboard API root.
pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1/";

const API_KEY_HEADER: &str = "X-Cisco-Meraki-API-Key";

/// Fallback wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

// ── Error response shape from the Dashboard API ──────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Dashboard sensor endpoints of one organization.
pub struct MerakiClient {
    http: reqwest::Client,
    base_url: Url,
    org_id: String,
}

impl MerakiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an API key and transport config.
    ///
    /// Injects `X-Cisco-Meraki-API-Key` as a sensitive default header on
    /// every request.
    pub fn from_api_key(
        base_url: &str,
        api_key: &SecretString,
        org_id: &str,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("invalid API key header value: {e}"),
            })?;
        key_value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key_value);

        let http = transport.build_client_with_headers(headers)?;
        Self::from_reqwest(base_url, http, org_id)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client, org_id: &str) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
            org_id: org_id.to_owned(),
        })
    }

    /// Ensure the base URL ends with `/` so relative joins keep the
    /// `/api/v1` prefix.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Sensor endpoints ─────────────────────────────────────────────

    /// List sensor-class devices in the organization, scoped to one network.
    ///
    /// `GET organizations/{orgId}/devices?productTypes[]=sensor&networkIds[]={networkId}`
    pub async fn list_sensor_devices(&self, network_id: &str) -> Result<Vec<SensorDevice>, Error> {
        let path = format!("organizations/{}/devices", self.org_id);
        self.get_with_params(
            &path,
            &[("productTypes[]", "sensor"), ("networkIds[]", network_id)],
        )
        .await
    }

    /// Latest reading per metric for every sensor in the network.
    ///
    /// `GET organizations/{orgId}/sensor/readings/latest?networkIds[]={networkId}`
    pub async fn latest_sensor_readings(
        &self,
        network_id: &str,
    ) -> Result<Vec<SensorReadings>, Error> {
        let path = format!("organizations/{}/sensor/readings/latest", self.org_id);
        self.get_with_params(&path, &[("networkIds[]", network_id)])
            .await
    }

    // ── HTTP plumbing ────────────────────────────────────────────────

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        Self::handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER.as_secs());
            return Error::RateLimited { retry_after_secs };
        }

        let raw = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&raw) {
            Ok(err) if !err.errors.is_empty() => err.errors.join("; "),
            _ if raw.is_empty() => status.to_string(),
            _ => raw,
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Error::Authentication { message };
        }

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = MerakiClient::normalize_base_url("https://api.meraki.com/api/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.meraki.com/api/v1/");
        let joined = url.join("organizations/1/devices").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://api.meraki.com/api/v1/organizations/1/devices"
        );
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(matches!(
            MerakiClient::normalize_base_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
