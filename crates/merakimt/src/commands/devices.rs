//! `merakimt devices`: one discovery pass, listed.

use std::sync::Arc;

use tabled::Tabled;

use merakimt_core::{Controller, ControllerConfig, CoreError, DeviceSnapshot, NullCatalog};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Capabilities")]
    capabilities: String,
}

fn device_row(d: &DeviceSnapshot) -> DeviceRow {
    DeviceRow {
        serial: d.identity.serial.clone(),
        name: d.identity.name.clone(),
        model: d.identity.model.clone(),
        mac: d.identity.mac.to_string(),
        capabilities: d.capabilities.to_string(),
    }
}

pub async fn handle(config: ControllerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = Controller::oneshot(config, Arc::new(NullCatalog), |controller| async move {
        let report = controller.discover().await?;
        tracing::debug!(added = report.added, skipped = report.skipped, "discovery finished");
        Ok::<_, CoreError>(controller.snapshot())
    })
    .await?;

    let out = output::render_list(&global.output, &devices, device_row, |d| {
        d.identity.serial.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
