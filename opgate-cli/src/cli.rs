//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// opgate -- ordered verification passes for an operator repository.
///
/// Use `opgate <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "opgate", version, about, long_about = None)]
pub struct Cli {
    /// Path to the opgate.toml configuration file.
    ///
    /// When omitted, `opgate.toml` in the current directory is used if present,
    /// otherwise built-in defaults plus environment overrides.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a selection of passes in order.
    Run(RunArgs),

    /// List the registered passes.
    List,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run passes in the given order; the first failure stops the run.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Comma-separated pass names (default: OPGATE_PASSES, then config, then
    /// format-verify,build,e2e-fast,e2e-slow,unit).
    #[arg(long)]
    pub passes: Option<String>,
}

// ---- config ----

/// Manage opgate configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, operator, cluster, object_store, e2e, unit, verify, build).
        #[arg(long)]
        section: Option<String>,
    },
}
