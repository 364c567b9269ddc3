//! Clap derive structures for the `merakimt` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// merakimt -- Meraki MT sensor telemetry bridge
#[derive(Debug, Parser)]
#[command(
    name = "merakimt",
    version,
    about = "Track Meraki MT sensors from the Dashboard API and MQTT telemetry",
    long_about = "Discovers Meraki MT environmental sensors, then keeps one canonical\n\
        state record per device by merging Dashboard API polling with the\n\
        per-device MQTT telemetry stream.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "MERAKIMT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard organization id (overrides config)
    #[arg(long, global = true)]
    pub org_id: Option<String>,

    /// Dashboard network id (overrides config)
    #[arg(long, short = 'n', global = true)]
    pub network_id: Option<String>,

    /// MQTT broker URL (overrides config)
    #[arg(long, global = true, conflicts_with = "no_push")]
    pub broker: Option<String>,

    /// Disable the MQTT push feed
    #[arg(long, global = true)]
    pub no_push: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Log Enums ───────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one serial per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the reconciliation daemon until interrupted
    Run(RunArgs),

    /// Discover sensors once and list them
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Discover sensors, poll their latest readings once, and print them
    #[command(alias = "r")]
    Readings(ReadingsArgs),

    /// Manage the configuration file and stored API key
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Where state updates are delivered
    #[arg(long, default_value = "log")]
    pub sink: SinkKind,

    /// Polling cadence in seconds; 0 disables polling (overrides config)
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Rediscovery cadence in seconds; 0 means startup only (overrides config)
    #[arg(long)]
    pub discovery_interval: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SinkKind {
    /// Emit catalog changes and attribute updates as tracing events
    Log,
    /// Write catalog changes and attribute updates to stdout as JSON lines
    JsonLines,
}

// ── Readings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReadingsArgs {
    /// Only show this device
    #[arg(long, short = 's')]
    pub serial: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (API key redacted)
    Show,

    /// Print the config file path
    Path,

    /// Write a starter config file from the current settings
    Init {
        /// Name of the environment variable holding the API key
        #[arg(long)]
        api_key_env: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Read an API key from stdin and store it in the system keyring
    SetKey,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "merakimt",
            "readings",
            "--serial",
            "Q3CA-0001",
            "--network-id",
            "N_1",
            "-o",
            "json",
            "-vv",
        ]);
        let cli = match cli {
            Ok(cli) => cli,
            Err(e) => panic!("parse failed: {e}"),
        };
        assert_eq!(cli.global.network_id.as_deref(), Some("N_1"));
        assert_eq!(cli.global.verbose, 2);
        assert!(matches!(cli.global.output, OutputFormat::Json));
        assert!(
            matches!(cli.command, Command::Readings(ReadingsArgs { serial: Some(ref s) }) if s == "Q3CA-0001")
        );
    }

    #[test]
    fn broker_conflicts_with_no_push() {
        let result =
            Cli::try_parse_from(["merakimt", "--no-push", "--broker", "mqtt://x", "devices"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_sink_defaults_to_log() {
        let cli = Cli::try_parse_from(["merakimt", "run", "--poll-interval", "0"]);
        match cli.map(|c| c.command) {
            Ok(Command::Run(args)) => {
                assert!(matches!(args.sink, SinkKind::Log));
                assert_eq!(args.poll_interval, Some(0));
                assert_eq!(args.discovery_interval, None);
            }
            other => panic!("unexpected parse result: {other:?}"),
        }
    }
}
