mod cli;
mod commands;
mod config;
mod error;
mod output;
mod sink;

use std::ffi::OsStr;
use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::cli::{Cli, Command, GlobalOpts, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed
    let guard = init_tracing(&cli.global);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        drop(guard);
        std::process::exit(code);
    }
}

/// Logs go to stderr (stdout carries command output and the JSON-lines
/// sink) or to `--log-file`. `RUST_LOG` overrides the `-v` level. Sink
/// events stay on at `info` unless `-q` is given.
fn init_tracing(global: &GlobalOpts) -> Option<WorkerGuard> {
    let level = match global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let filter = EnvFilter::new(level);
        if global.quiet {
            return filter;
        }
        // The log sink is the output of `run`; keep it visible without -v
        match format!("{}=info", sink::STATE_TARGET).parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    });

    let (writer, guard) = match global.log_file {
        Some(ref path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file = path.file_name().unwrap_or(OsStr::new("merakimt.log"));
            let appender = tracing_appender::rolling::never(dir, file);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(global.log_file.is_none())
        .with_target(false);

    match global.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    guard
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need Dashboard credentials
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "merakimt", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let controller_config = config::controller_config(&cli.global)?;
            tracing::debug!(command = ?cmd, network_id = %controller_config.network_id, "dispatching command");
            commands::dispatch(cmd, controller_config, &cli.global).await
        }
    }
}
