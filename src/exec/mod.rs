// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `Backend` trait the dispatcher talks to.
//! - [`local`] runs scripts as `bash` subprocesses behind a counting
//!   throttle.
//! - [`sge`] submits scripts with `qsub`, holding on predecessor job ids.

pub mod backend;
pub mod local;
pub mod sge;

pub use backend::{Backend, BackendFuture};
pub use local::{LocalBackend, LocalStats};
pub use sge::{QsubSubmitter, SgeBackend, SubmitFuture, Submitter};
