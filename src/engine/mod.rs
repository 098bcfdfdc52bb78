// src/engine/mod.rs

//! Dispatch engine for batchdag.
//!
//! Every (task, job-key) pair becomes one [`Unit`]: it waits on the cells the
//! router names for it, runs through a [`crate::exec::Backend`], then fills
//! the cells of its successors. The [`Dispatcher`] wires all units, spawns
//! them at once, fires Start and drains End.

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Sample ID, barcode, or `"batch"`.
pub type JobKey = String;

/// What a unit hands to its successors: a cluster job id, a local
/// `name[job-key]` tag, or `""` when the job was skipped.
pub type JobId = String;

pub mod dispatcher;
pub mod unit;

pub use dispatcher::{Dispatcher, RunSummary};
pub use unit::{Unit, UnitKind, UnitReport};
