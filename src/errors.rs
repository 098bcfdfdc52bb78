// src/errors.rs

//! Crate-wide error type.
//!
//! Every failure aborts the whole run; the variants exist so the single
//! top-level handler in `main` can log which task, job-key and script broke.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Granularity;

#[derive(Error, Debug)]
pub enum BatchdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("duplicate sampleID: {0}")]
    DuplicateSample(String),

    #[error("task '{task}' lists unknown task '{prior}' in `prior`")]
    UnknownPrior { task: String, prior: String },

    #[error("unsupported router: {producer}->{consumer}")]
    UnsupportedRouter {
        producer: Granularity,
        consumer: Granularity,
    },

    #[error("task '{task}' has no script for job-key '{job_key}'")]
    MissingScript { task: String, job_key: String },

    #[error("synchronization cell {producer}->{consumer}[{job_key}] is missing or already taken")]
    MissingCell {
        producer: String,
        consumer: String,
        job_key: String,
    },

    #[error("Task[{task}:{job_key}] lost its signal from '{predecessor}' (upstream unit aborted)")]
    UpstreamAborted {
        task: String,
        job_key: String,
        predecessor: String,
    },

    #[error("Task[{task}:{job_key}] script {script:?} exited with code {code}")]
    TaskFailed {
        task: String,
        job_key: String,
        script: PathBuf,
        code: i32,
    },

    #[error("Task[{task}:{job_key}] failed to start script {script:?}: {source}")]
    SpawnFailed {
        task: String,
        job_key: String,
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task[{task}:{job_key}] submission of {script:?} failed: {reason}")]
    SubmitFailed {
        task: String,
        job_key: String,
        script: PathBuf,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BatchdagError>;
