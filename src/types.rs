use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Job-key of a batch-granularity unit (and of Start / End).
pub const BATCH_KEY: &str = "batch";

/// How many instances of a step exist per run.
///
/// - `Batch`: exactly one instance, keyed by [`BATCH_KEY`].
/// - `Barcode`: one instance per barcode, keyed by barcode id.
/// - `Sample`: one instance per sample, keyed by sample id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Batch,
    Barcode,
    Sample,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Batch => "batch",
            Granularity::Barcode => "barcode",
            Granularity::Sample => "sample",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "batch" => Ok(Granularity::Batch),
            "barcode" => Ok(Granularity::Barcode),
            "sample" => Ok(Granularity::Sample),
            other => Err(format!(
                "invalid step type: {other} (expected \"batch\", \"barcode\" or \"sample\")"
            )),
        }
    }
}

/// Where step scripts are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Run scripts as local subprocesses under a concurrency cap.
    Local,
    /// Submit scripts to Sun Grid Engine with `qsub`.
    Sge,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Local
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(RunMode::Local),
            "sge" => Ok(RunMode::Sge),
            other => Err(format!(
                "invalid run mode: {other} (expected \"local\" or \"sge\")"
            )),
        }
    }
}
