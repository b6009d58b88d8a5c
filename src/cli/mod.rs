//! Command-line interface for systa-probe.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::InterfaceCandidate;

/// systa-probe - SystaComfort UDP protocol tool
#[derive(Parser, Debug)]
#[command(
    name = "systa-probe",
    author,
    version,
    about = "Discover and talk to a Paradigma SystaComfort controller over UDP",
    long_about = r#"
systa-probe speaks the SystaComfort UDP protocol:

  discover   find a unit by broadcast and print its identity
  listen     keep the unit's telemetry stream alive by acknowledging frames
  probe      search for the announcement offset of an unknown channel
  set-mode   let housekeeping frames pass, then send a parameter announcement

The session commands must be able to bind the session port on the
interface the unit was found on. The unit has to be configured to send
its telemetry to this host.
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find a unit on the local network
    Discover(DiscoverArgs),

    /// Acknowledge telemetry until the unit goes silent
    Listen(ListenArgs),

    /// Search for an unknown announcement offset
    Probe(ProbeArgs),

    /// Send a parameter announcement after N housekeeping frames
    SetMode(SetModeArgs),

    /// Show example configuration
    Config(ConfigArgs),
}

/// Interface selection shared by all unit-facing commands
#[derive(Args, Debug, Clone, Default)]
pub struct InterfaceArgs {
    /// Interface to search as LOCAL=BROADCAST (repeatable; default: all host interfaces)
    #[arg(short, long = "interface", value_name = "LOCAL=BROADCAST")]
    pub interfaces: Vec<InterfaceCandidate>,

    /// Reply timeout for discovery queries (e.g. "2s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<std::time::Duration>,
}

/// Discover command arguments
#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub interfaces: InterfaceArgs,
}

/// Listen command arguments
#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub interfaces: InterfaceArgs,

    /// Session port to bind
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,
}

/// Probe command arguments
#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub interfaces: InterfaceArgs,

    /// First offset to try (hex like 0xBFB5 or decimal)
    #[arg(long, value_parser = crate::util::parse_u16)]
    pub initial: Option<u16>,

    /// Seed for a reproducible search
    #[arg(long)]
    pub seed: Option<u64>,

    /// Give up after this many trials
    #[arg(long)]
    pub max_trials: Option<u64>,
}

/// Set-mode command arguments
#[derive(Args, Debug)]
pub struct SetModeArgs {
    #[command(flatten)]
    pub interfaces: InterfaceArgs,

    /// Frames to acknowledge before announcing
    #[arg(long)]
    pub skip: Option<usize>,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the effective configuration instead of the example
    #[arg(long)]
    pub effective: bool,

    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
