//! `merakimt run`: the long-lived reconciliation daemon.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use merakimt_core::{Controller, ControllerConfig, DeviceCatalog};

use crate::cli::{GlobalOpts, RunArgs, SinkKind};
use crate::error::CliError;
use crate::sink::{JsonLinesCatalog, LogCatalog};

fn catalog(kind: SinkKind) -> Arc<dyn DeviceCatalog> {
    match kind {
        SinkKind::Log => Arc::new(LogCatalog),
        SinkKind::JsonLines => Arc::new(JsonLinesCatalog::new(std::io::stdout())),
    }
}

pub async fn handle(
    mut config: ControllerConfig,
    args: RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.poll_interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.discovery_interval {
        config.discovery_interval = Duration::from_secs(secs);
    }

    let controller = Controller::new(config, catalog(args.sink))?;
    controller.start().await?;

    if !global.quiet && matches!(args.sink, SinkKind::Log) {
        eprintln!(
            "merakimt: tracking {} sensor(s) on network {}; press Ctrl-C to stop",
            controller.registry().len(),
            controller.config().network_id
        );
    }

    let signal = tokio::signal::ctrl_c().await;
    if let Err(ref e) = signal {
        warn!(error = %e, "failed to wait for Ctrl-C, shutting down");
    }

    info!("shutting down");
    controller.shutdown().await;
    info!(
        devices = controller.registry().len(),
        last_poll = ?controller.registry().last_poll(),
        last_push = ?controller.registry().last_push(),
        "stopped"
    );

    signal.map_err(CliError::from)
}
