//! `merakimt readings`: discover, poll once, print canonical state.

use std::fmt::Display;
use std::sync::Arc;

use tabled::Tabled;

use merakimt_core::{
    CanonicalState, Controller, ControllerConfig, CoreError, DeviceSnapshot, NullCatalog,
};

use crate::cli::{GlobalOpts, ReadingsArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Temp °C")]
    temperature: String,
    #[tabled(rename = "Humidity %")]
    humidity: String,
    #[tabled(rename = "Water")]
    flooded: String,
    #[tabled(rename = "Door")]
    door: String,
    #[tabled(rename = "Air quality")]
    air_quality: String,
    #[tabled(rename = "TVOC")]
    voc: String,
    #[tabled(rename = "PM2.5")]
    pm25: String,
    #[tabled(rename = "Battery %")]
    battery: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

fn cell<T: Display>(value: Option<T>, color: bool) -> String {
    value.map_or_else(|| output::missing(color), |v| v.to_string())
}

fn flag(value: Option<bool>, on: &str, off: &str, color: bool) -> String {
    match value {
        Some(true) => on.to_owned(),
        Some(false) => off.to_owned(),
        None => output::missing(color),
    }
}

fn reading_row(d: &DeviceSnapshot, color: bool) -> ReadingRow {
    let s: &CanonicalState = &d.state;
    ReadingRow {
        serial: d.identity.serial.clone(),
        name: d.identity.name.clone(),
        temperature: cell(s.temperature, color),
        humidity: cell(s.humidity, color),
        flooded: flag(s.flooded, "wet", "dry", color),
        door: flag(s.binary_state, "open", "closed", color),
        air_quality: cell(s.air_quality, color),
        voc: cell(s.voc_density, color),
        pm25: cell(s.pm25_density, color),
        battery: cell(s.battery_level, color),
        updated: cell(
            d.updated_at.map(|t| t.format("%Y-%m-%d %H:%M:%S")),
            color,
        ),
    }
}

fn detail(d: &DeviceSnapshot) -> String {
    let s = &d.state;
    let lines = [
        ("Serial", d.identity.serial.clone()),
        ("Name", d.identity.name.clone()),
        ("Model", d.identity.model.clone()),
        ("MAC", d.identity.mac.to_string()),
        ("Capabilities", d.capabilities.to_string()),
        ("Temperature", cell(s.temperature.map(|t| format!("{t} °C")), false)),
        ("Humidity", cell(s.humidity.map(|h| format!("{h} %")), false)),
        ("Water", flag(s.flooded, "detected", "dry", false)),
        ("Door", flag(s.binary_state, "open", "closed", false)),
        ("Air quality", cell(s.air_quality, false)),
        ("TVOC", cell(s.voc_density, false)),
        ("PM2.5", cell(s.pm25_density, false)),
        ("Battery", cell(s.battery_level.map(|b| format!("{b} %")), false)),
        ("Updated", cell(d.updated_at.map(|t| t.to_rfc3339()), false)),
    ];
    lines
        .iter()
        .map(|(k, v)| format!("{k:<14}{v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(
    config: ControllerConfig,
    args: ReadingsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let devices = Controller::oneshot(config, Arc::new(NullCatalog), |controller| async move {
        controller.discover().await?;
        let report = controller.poll().await?;
        tracing::debug!(
            applied = report.applied,
            ignored = report.ignored,
            malformed = report.malformed,
            "poll finished"
        );
        Ok::<_, CoreError>(controller.snapshot())
    })
    .await?;

    if let Some(serial) = args.serial {
        let device = devices
            .into_iter()
            .find(|d| d.identity.serial == serial)
            .ok_or(CliError::NotFound { identifier: serial })?;
        let out = output::render_single(&global.output, &device, detail, |d| {
            d.identity.serial.clone()
        })?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let color = output::should_color();
    let out = output::render_list(
        &global.output,
        &devices,
        |d| reading_row(d, color),
        |d| d.identity.serial.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
