// ── Command API ──
//
// Operations a consumer can request from a running controller. They flow
// through the controller's command channel and are answered on a oneshot.

use crate::error::CoreError;
use crate::model::TemperatureUnit;
use crate::poll::PollReport;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a polling cycle now instead of waiting for the next tick.
    RefreshReadings,
    /// Change the reported temperature unit of one device.
    SetTemperatureUnit {
        serial: String,
        unit: TemperatureUnit,
    },
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Polled(PollReport),
}
