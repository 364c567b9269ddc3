// Integration tests for `MerakiClient` using wiremock.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use merakimt_api::{Error, MerakiClient, TransportConfig};

const ORG: &str = "549236";
const NET: &str = "N_24329156";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, MerakiClient) {
    let server = MockServer::start().await;
    let base = format!("{}/api/v1", server.uri());
    let client = MerakiClient::from_reqwest(&base, reqwest::Client::new(), ORG).unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_sensor_devices() {
    let (server, client) = setup().await;

    let body = json!([
        {
            "serial": "Q3CA-AAAA-0001",
            "mac": "aa:bb:cc:00:00:01",
            "model": "MT10",
            "name": "Cold room",
            "productType": "sensor",
            "networkId": NET,
            "sensor": { "metrics": ["temperature", "humidity", "battery"] }
        },
        {
            "serial": "Q3CA-AAAA-0002",
            "mac": "aa:bb:cc:00:00:02",
            "model": "MT20",
            "name": null,
            "productType": "sensor",
            "sensor": { "metrics": ["door"] }
        }
    ]);

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/organizations/{ORG}/devices")))
        .and(query_param("productTypes[]", "sensor"))
        .and(query_param("networkIds[]", NET))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_sensor_devices(NET).await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].serial, "Q3CA-AAAA-0001");
    assert_eq!(devices[0].name.as_deref(), Some("Cold room"));
    assert_eq!(devices[0].metrics(), ["temperature", "humidity", "battery"]);
    assert!(devices[1].name.is_none());
    assert_eq!(devices[1].model, "MT20");
}

#[tokio::test]
async fn test_latest_sensor_readings() {
    let (server, client) = setup().await;

    let body = json!([
        {
            "serial": "Q3CA-AAAA-0001",
            "network": { "id": NET, "name": "Warehouse" },
            "readings": [
                {
                    "ts": "2024-03-01T10:00:00Z",
                    "metric": "temperature",
                    "temperature": { "fahrenheit": 70.7, "celsius": 21.5 }
                },
                {
                    "ts": "2024-03-01T10:00:00Z",
                    "metric": "battery",
                    "battery": { "percentage": 94 }
                }
            ]
        }
    ]);

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/organizations/{ORG}/sensor/readings/latest")))
        .and(query_param("networkIds[]", NET))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let blocks = client.latest_sensor_readings(NET).await.unwrap();

    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.network.as_ref().unwrap().id, NET);
    let readings: Vec<_> = block.decoded().map(Result::unwrap).collect();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].value().unwrap()["celsius"], 21.5);
    assert_eq!(readings[1].value().unwrap()["percentage"], 94);
}

#[tokio::test]
async fn test_api_key_header_is_sent() {
    let server = MockServer::start().await;
    let key = SecretString::from("0123456789abcdef".to_owned());
    let client = MerakiClient::from_api_key(
        &format!("{}/api/v1/", server.uri()),
        &key,
        ORG,
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/organizations/{ORG}/devices")))
        .and(header("X-Cisco-Meraki-API-Key", "0123456789abcdef"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_sensor_devices(NET).await.unwrap();
    assert!(devices.is_empty());
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "errors": ["Invalid API key"] })),
        )
        .mount(&server)
        .await;

    let err = client.list_sensor_devices(NET).await.unwrap_err();
    match err {
        Error::Authentication { message } => assert_eq!(message, "Invalid API key"),
        other => panic!("expected Authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn test_not_found_maps_to_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "errors": ["Organization not found", "check orgId"] })),
        )
        .mount(&server)
        .await;

    let err = client.latest_sensor_readings(NET).await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Organization not found; check orgId");
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_reads_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = client.latest_sensor_readings(NET).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { retry_after_secs: 7 }));
}

#[tokio::test]
async fn test_server_error_plain_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.list_sensor_devices(NET).await.unwrap_err();
    assert!(matches!(&err, Error::Api { status: 502, message } if message == "bad gateway"));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"an array\"}"))
        .mount(&server)
        .await;

    let err = client.list_sensor_devices(NET).await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("not")),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}
