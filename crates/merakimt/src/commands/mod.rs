//! Command dispatch: bridges CLI args -> controller -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod readings;
pub mod run;

use merakimt_core::ControllerConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that needs Dashboard credentials.
pub async fn dispatch(
    cmd: Command,
    config: ControllerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(config, args, global).await,
        Command::Devices => devices::handle(config, global).await,
        Command::Readings(args) => readings::handle(config, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need a controller".into(),
        )),
    }
}
