// src/exec/local.rs

//! Local subprocess backend.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::dag::ScheduledJob;
use crate::engine::JobId;
use crate::errors::{BatchdagError, Result};
use crate::exec::backend::{Backend, BackendFuture};
use crate::fs::FileSystem;

/// Counters around the local throttle.
///
/// `running` counts units past the marker check that hold a slot; `peak` is
/// the largest value `running` has reached.
#[derive(Debug, Default)]
pub struct LocalStats {
    running: AtomicUsize,
    peak: AtomicUsize,
    executed: AtomicUsize,
    skipped: AtomicUsize,
}

impl LocalStats {
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Scripts run (or slept through, in dry-run mode).
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Scripts skipped because their completion marker exists.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    fn enter(&self) -> RunningGuard<'_> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.executed.fetch_add(1, Ordering::SeqCst);
        RunningGuard { stats: self }
    }
}

struct RunningGuard<'a> {
    stats: &'a LocalStats,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.stats.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs `bash <script>` for each job, at most `threshold` at a time.
///
/// In dry-run mode every job sleeps for a fixed interval instead.
#[derive(Debug)]
pub struct LocalBackend {
    throttle: Arc<Semaphore>,
    threshold: usize,
    dry_run: Option<Duration>,
    fs: Arc<dyn FileSystem>,
    stats: Arc<LocalStats>,
}

impl LocalBackend {
    pub fn new(threshold: usize, fs: Arc<dyn FileSystem>) -> Self {
        let threshold = threshold.max(1);
        Self {
            throttle: Arc::new(Semaphore::new(threshold)),
            threshold,
            dry_run: None,
            fs,
            stats: Arc::new(LocalStats::default()),
        }
    }

    /// Sleep for `interval` instead of running scripts.
    pub fn with_dry_run(mut self, interval: Duration) -> Self {
        self.dry_run = Some(interval);
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn stats(&self) -> Arc<LocalStats> {
        Arc::clone(&self.stats)
    }

    async fn run(&self, job: &ScheduledJob) -> Result<JobId> {
        let _permit = self
            .throttle
            .acquire()
            .await
            .map_err(|e| BatchdagError::Other(e.into()))?;

        if self.fs.exists(&job.completion_marker()) {
            info!(
                task = %job.task,
                job_key = %job.job_key,
                script = %job.script.display(),
                "skip complete script"
            );
            self.stats.skipped.fetch_add(1, Ordering::SeqCst);
            return Ok(JobId::new());
        }

        let _running = self.stats.enter();
        info!(
            task = %job.task,
            job_key = %job.job_key,
            script = %job.script.display(),
            dry_run = self.dry_run.is_some(),
            "running script"
        );

        match self.dry_run {
            Some(interval) => tokio::time::sleep(interval).await,
            None => run_script(job).await?,
        }

        Ok(job.local_id())
    }
}

impl Backend for LocalBackend {
    fn execute<'a>(&'a self, job: &'a ScheduledJob) -> BackendFuture<'a> {
        Box::pin(self.run(job))
    }
}

/// Run one script to completion; a non-zero exit is an error.
async fn run_script(job: &ScheduledJob) -> Result<()> {
    let spawn_failed = |source: std::io::Error| BatchdagError::SpawnFailed {
        task: job.task.clone(),
        job_key: job.job_key.clone(),
        script: job.script.clone(),
        source,
    };

    let mut child = Command::new("bash")
        .arg(&job.script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_failed)?;

    log_lines(child.stdout.take(), job, "stdout");
    log_lines(child.stderr.take(), job, "stderr");

    let status = child.wait().await.map_err(spawn_failed)?;
    let code = status.code().unwrap_or(-1);

    info!(
        task = %job.task,
        job_key = %job.job_key,
        exit_code = code,
        success = status.success(),
        "script exited"
    );

    if !status.success() {
        return Err(BatchdagError::TaskFailed {
            task: job.task.clone(),
            job_key: job.job_key.clone(),
            script: job.script.clone(),
            code,
        });
    }
    Ok(())
}

/// Drain a child pipe to EOF so its buffer never fills; lines are logged at
/// debug. Output need not be UTF-8.
fn log_lines<R>(pipe: Option<R>, job: &ScheduledJob, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else { return };
    let task = job.task.clone();
    let job_key = job.job_key.clone();
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    debug!(task = %task, job_key = %job_key, stream, "{}", text.trim_end());
                }
                Err(e) => {
                    debug!(task = %task, job_key = %job_key, stream, error = %e, "pipe read failed");
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }
        }
    });
}
