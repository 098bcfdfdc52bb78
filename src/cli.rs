// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, ValueEnum};

use crate::types::RunMode;

/// Command-line arguments for `batchdag`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "batchdag",
    version,
    about = "Expand a step table over a sample list and run it as a DAG of shell scripts.",
    long_about = None
)]
pub struct CliArgs {
    /// Sample list (TSV with a header line).
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output root; scripts, logs and provenance files are written here.
    #[arg(long, visible_alias = "workdir", value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Step table (TSV). Default: `<exe dir>/etc/allSteps.tsv`.
    #[arg(long, value_name = "PATH")]
    pub cfg: Option<PathBuf>,

    /// Pipeline install root holding `script/<step>.sh`. Default: `<exe dir>`.
    #[arg(long, value_name = "DIR")]
    pub local: Option<PathBuf>,

    /// Run scripts locally or submit them to SGE.
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<RunMode>,

    /// Maximum number of concurrently running local scripts.
    #[arg(long, value_name = "N")]
    pub threshold: Option<usize>,

    /// Pass `-cwd` to qsub.
    #[arg(long)]
    pub cwd: bool,

    /// SGE project (`qsub -P`).
    #[arg(short = 'P', long = "project", value_name = "PROJECT")]
    pub project: Option<String>,

    /// SGE queue (`qsub -q`).
    #[arg(short = 'q', long = "queue", value_name = "QUEUE")]
    pub queue: Option<String>,

    /// Sleep instead of running scripts (local mode).
    #[arg(long, visible_alias = "dryRun")]
    pub dry_run: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BATCHDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Optional TOML settings file; flags override its values.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Print the generated help text to stdout.
pub fn print_usage() {
    let _ = CliArgs::command().print_help();
    println!();
}
