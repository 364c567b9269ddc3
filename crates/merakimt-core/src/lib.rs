// merakimt-core: Reconciles the Meraki MT polling and push feeds into one
// canonical state record per sensor.

pub mod command;
pub mod config;
pub mod controller;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod model;
pub mod normalize;
pub mod poll;
pub mod push;
pub mod sink;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::ControllerConfig;
pub use controller::{Controller, ControllerState};
pub use discovery::{DiscoveryCoordinator, DiscoveryReport};
pub use error::CoreError;
pub use normalize::{Feed, normalize};
pub use poll::{PollReport, PollingReconciler};
pub use push::{PushOutcome, PushReconciler};
pub use sink::{
    ChangeKind, DeviceCatalog, DeviceChange, DeviceChangeSet, DeviceInfo, DeviceManifest,
    DeviceStateSink, NullCatalog, NullSink,
};
pub use store::{DeviceRegistry, DeviceSnapshot, RegistryEntry};

pub use model::{
    AirQuality, AttributeValue, CanonicalState, Capability, CapabilitySet, DeviceIdentity,
    MacAddress, TemperatureUnit,
};
