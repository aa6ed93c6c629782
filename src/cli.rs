// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{ArgAction, Parser, ValueEnum};

/// Command-line arguments for `revbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "revbuild",
    version,
    about = "Rebuild (and republish) a versioned content source whenever it changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Content source identifier (for the directory source: a path).
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Build once if the source is ahead of the last built version, then exit.
    ///
    /// Without this flag revbuild keeps following updates.
    #[arg(long = "no-subscribe", visible_alias = "once", action = ArgAction::SetFalse)]
    pub subscribe: bool,

    /// Do not republish build output.
    #[arg(long = "no-share", action = ArgAction::SetFalse)]
    pub share: bool,

    /// Path to the config file (TOML).
    ///
    /// When omitted, `Revbuild.toml` is used if it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Directory holding per-source state (overrides `[storage].data_dir`).
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REVBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve the source and print the effective settings without building.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse arguments, reporting failures instead of exiting.
pub fn try_parse() -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse()
}
