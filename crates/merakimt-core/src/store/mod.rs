// ── In-memory device store ──

mod registry;

pub use registry::{DeviceRegistry, DeviceSnapshot, RegistryEntry, Upserted};
