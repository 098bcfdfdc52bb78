// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! Dispatch units hand a [`ScheduledJob`] to a `Backend` and get back the
//! identifier to forward to successors. An empty identifier means the job
//! was skipped (already complete) and successors have nothing to hold on.
//!
//! - [`LocalBackend`](super::LocalBackend) runs scripts as subprocesses.
//! - [`SgeBackend`](super::SgeBackend) submits them to a cluster scheduler.
//! - Tests provide their own implementation that records calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::ScheduledJob;
use crate::engine::JobId;
use crate::errors::Result;

/// Boxed future returned by backends.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<JobId>> + Send + 'a>>;

/// Trait abstracting how one (task, job-key) instance is executed.
pub trait Backend: Send + Sync {
    /// Execute or submit `job`, returning the identifier successors wait on.
    fn execute<'a>(&'a self, job: &'a ScheduledJob) -> BackendFuture<'a>;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn execute<'a>(&'a self, job: &'a ScheduledJob) -> BackendFuture<'a> {
        (**self).execute(job)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn execute<'a>(&'a self, job: &'a ScheduledJob) -> BackendFuture<'a> {
        (**self).execute(job)
    }
}
