// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{Granularity, RunMode};

/// One TSV row keyed by column header, exactly as read.
pub type RawRow = BTreeMap<String, String>;

/// Step table as read from disk, before any row-level checks.
#[derive(Debug, Clone, Default)]
pub struct RawStepTable {
    pub rows: Vec<RawRow>,
}

/// A validated step table.
///
/// Construct it with `StepTable::try_from(raw)`; the only way around
/// validation is [`StepTable::new_unchecked`], kept for the validator itself.
#[derive(Debug, Clone)]
pub struct StepTable {
    pub steps: Vec<StepRow>,
}

impl StepTable {
    pub(crate) fn new_unchecked(steps: Vec<StepRow>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Typed view of one step-table row:
///
/// ```text
/// name    type    args            mem  thread  prior         submitArgs
/// filter  sample  fq1,fq2         4    2
/// bwa     sample  primer          8    4       filter
/// merge   batch   list            2    1       bwa           -l h=node01
/// ```
#[derive(Debug, Clone)]
pub struct StepRow {
    pub name: String,
    pub granularity: Granularity,
    /// Template argument names from the comma-separated `args` column.
    pub args: Vec<String>,
    /// Memory hint in GB (`mem` column, passed through as text).
    pub mem: String,
    /// Thread count hint (`thread` column).
    pub thread: String,
    /// Predecessor names; empty means "depends on Start".
    pub prior: Vec<String>,
    /// Extra cluster submission flags from the `submitArgs` column.
    pub submit_args: Vec<String>,
    /// The untouched row.
    pub raw: RawRow,
}

/// Sample list as read from disk.
///
/// Header order is kept so per-barcode list files can be written back with
/// the same columns.
#[derive(Debug, Clone, Default)]
pub struct SampleSheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Optional TOML settings file.
///
/// ```toml
/// [run]
/// mode = "local"
/// threshold = 12
/// dry_run_sleep_ms = 10000
///
/// [sge]
/// cwd = true
/// project = "P18Z10200N0423"
/// queue = "bc.q"
///
/// [layout]
/// batch_dirs = ["shell", "javatmp"]
/// sample_dirs = ["raw", "filter", "bwa", "shell", "vcf"]
/// ```
///
/// Every section is optional; CLI flags take precedence over these values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub sge: SgeSection,

    #[serde(default)]
    pub layout: LayoutSection,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub mode: RunMode,

    /// Maximum number of concurrently running local scripts.
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// How long a dry-run unit pretends to work.
    #[serde(default = "default_dry_run_sleep_ms")]
    pub dry_run_sleep_ms: u64,
}

fn default_threshold() -> usize {
    12
}

fn default_dry_run_sleep_ms() -> u64 {
    10_000
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            threshold: default_threshold(),
            dry_run_sleep_ms: default_dry_run_sleep_ms(),
        }
    }
}

/// `[sge]` section: flags added to every `qsub` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SgeSection {
    #[serde(default)]
    pub cwd: bool,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub queue: Option<String>,
}

/// `[layout]` section: working directories created before dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutSection {
    /// Directories created directly under the output root.
    #[serde(default = "default_batch_dirs")]
    pub batch_dirs: Vec<String>,

    /// Directories created under `<outdir>/<sampleID>/`.
    #[serde(default = "default_sample_dirs")]
    pub sample_dirs: Vec<String>,
}

fn default_batch_dirs() -> Vec<String> {
    ["shell", "javatmp"].iter().map(|s| s.to_string()).collect()
}

fn default_sample_dirs() -> Vec<String> {
    ["raw", "filter", "bwa", "shell", "vcf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            batch_dirs: default_batch_dirs(),
            sample_dirs: default_sample_dirs(),
        }
    }
}
