// merakimt-api: Async Rust client for the Meraki Dashboard sensor endpoints
// and the MT sensor MQTT telemetry feed.

pub mod client;
pub mod error;
pub mod push;
pub mod transport;
pub mod types;

pub use client::{DEFAULT_BASE_URL, MerakiClient};
pub use error::Error;
pub use push::{PushClient, PushConfig, PushMessage, PushTopic, ReconnectConfig};
pub use transport::TransportConfig;
pub use types::{NetworkRef, SensorDetails, SensorDevice, SensorReading, SensorReadings};
