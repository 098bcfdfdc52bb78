// src/config/mod.rs

//! Configuration loading and validation for batchdag.
//!
//! Responsibilities:
//! - Define the parsed shapes of the step table, the sample list and the
//!   optional TOML settings file (`model.rs`).
//! - Load them from disk (`loader.rs`).
//! - Validate individual step rows (`validate.rs`). Graph-level checks live
//!   in the DAG builder.
//! - Layer CLI flags over settings into the final options (`options.rs`).

pub mod loader;
pub mod model;
pub mod options;
pub mod validate;

pub use loader::{load_sample_sheet, load_settings, load_step_table, read_tsv};
pub use options::{RunOptions, exe_dir};
pub use model::{
    LayoutSection, RawRow, RawStepTable, RunSection, SampleSheet, Settings, SgeSection,
    StepRow, StepTable,
};
