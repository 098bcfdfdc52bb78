use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use batchdag::dag::ScheduledJob;
use batchdag::engine::JobId;
use batchdag::errors::{BatchdagError, Result};
use batchdag::exec::{Backend, BackendFuture};

/// A fake backend that:
/// - records every job it is handed, in call order
/// - returns `name[job-key]` (or `""` for jobs marked complete)
/// - optionally fails one (task, job-key) with a non-zero exit
/// - tracks how many jobs are in flight at once.
#[derive(Debug, Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<ScheduledJob>>,
    complete: BTreeSet<(String, String)>,
    fail: Option<(String, String)>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat this job as already done: it returns `""` without recording.
    pub fn with_complete(mut self, task: &str, job_key: &str) -> Self {
        self.complete.insert((task.to_string(), job_key.to_string()));
        self
    }

    /// Make this job fail with exit code 1.
    pub fn with_failure(mut self, task: &str, job_key: &str) -> Self {
        self.fail = Some((task.to_string(), job_key.to_string()));
        self
    }

    /// Sleep this long inside every job.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ScheduledJob> {
        self.calls.lock().unwrap().clone()
    }

    /// `task[job-key]` of every recorded call, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.calls().iter().map(|j| j.local_id()).collect()
    }

    /// The recorded call for one unit.
    pub fn call(&self, task: &str, job_key: &str) -> Option<ScheduledJob> {
        self.calls()
            .into_iter()
            .find(|j| j.task == task && j.job_key == job_key)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn run(&self, job: &ScheduledJob) -> Result<JobId> {
        let key = (job.task.clone(), job.job_key.clone());
        if self.complete.contains(&key) {
            return Ok(JobId::new());
        }

        self.calls.lock().unwrap().push(job.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.as_ref() == Some(&key) {
            return Err(BatchdagError::TaskFailed {
                task: job.task.clone(),
                job_key: job.job_key.clone(),
                script: job.script.clone(),
                code: 1,
            });
        }
        Ok(job.local_id())
    }
}

impl Backend for FakeBackend {
    fn execute<'a>(&'a self, job: &'a ScheduledJob) -> BackendFuture<'a> {
        Box::pin(self.run(job))
    }
}
