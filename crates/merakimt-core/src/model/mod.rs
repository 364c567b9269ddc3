// ── Domain model ──

pub mod capability;
pub mod identity;
pub mod state;

pub use capability::{Capability, CapabilitySet};
pub use identity::{DeviceIdentity, MacAddress};
pub use state::{AirQuality, AttributeValue, CanonicalState, TemperatureUnit};
