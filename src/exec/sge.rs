// src/exec/sge.rs

//! Sun Grid Engine submission backend.
//!
//! Submission is fire-and-forget: the returned job id is forwarded to
//! successors, which pass it to `qsub -hold_jid`. Ordering of the actual
//! work is left to the cluster scheduler.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::process::Command;
use tracing::info;

use crate::config::model::SgeSection;
use crate::dag::{Resources, ScheduledJob};
use crate::engine::JobId;
use crate::errors::{BatchdagError, Result};
use crate::exec::backend::{Backend, BackendFuture};
use crate::fs::FileSystem;

/// Boxed future returned by submitters.
pub type SubmitFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<JobId>> + Send + 'a>>;

/// The black-box cluster submission call.
pub trait Submitter: Send + Sync {
    /// Submit `script` holding on `hold`, returning the scheduler's job id.
    fn submit<'a>(&'a self, script: &'a Path, hold: &'a [JobId], args: &'a [String]) -> SubmitFuture<'a>;
}

impl<S: Submitter + ?Sized> Submitter for Arc<S> {
    fn submit<'a>(&'a self, script: &'a Path, hold: &'a [JobId], args: &'a [String]) -> SubmitFuture<'a> {
        (**self).submit(script, hold, args)
    }
}

/// Submits with the `qsub` command line.
#[derive(Debug, Clone)]
pub struct QsubSubmitter {
    program: String,
}

impl QsubSubmitter {
    pub fn new() -> Self {
        Self {
            program: "qsub".to_string(),
        }
    }

    /// Use another executable (a wrapper script, or a stub in tests).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for QsubSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Submitter for QsubSubmitter {
    fn submit<'a>(&'a self, script: &'a Path, hold: &'a [JobId], args: &'a [String]) -> SubmitFuture<'a> {
        Box::pin(async move {
            let mut cmd = Command::new(&self.program);
            cmd.arg("-terse");
            if !hold.is_empty() {
                cmd.arg("-hold_jid").arg(hold.join(","));
            }
            cmd.args(args).arg(script);

            let output = cmd
                .output()
                .await
                .with_context(|| format!("spawning {} for {:?}", self.program, script))?;

            if !output.status.success() {
                return Err(anyhow!(
                    "{} exited with {:?}: {}",
                    self.program,
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }

            parse_job_id(&String::from_utf8_lossy(&output.stdout))
                .ok_or_else(|| anyhow!("no job id in {} output", self.program))
        })
    }
}

/// First token of `qsub -terse` output, without any array-task suffix:
/// `"4242.1-10:1\n"` becomes `"4242"`.
pub fn parse_job_id(stdout: &str) -> Option<JobId> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let id = first.split('.').next()?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Global submission flags from `--cwd`, `-q` and `-P`.
pub fn global_submit_args(sge: &SgeSection) -> Vec<String> {
    let mut args = Vec::new();
    if sge.cwd {
        args.push("-cwd".to_string());
    }
    if let Some(queue) = sge.queue.as_deref().filter(|q| !q.is_empty()) {
        args.push("-q".to_string());
        args.push(queue.to_string());
    }
    if let Some(project) = sge.project.as_deref().filter(|p| !p.is_empty()) {
        args.push("-P".to_string());
        args.push(project.to_string());
    }
    args
}

/// `-l vf=<mem>G,p=<thread>`, leaving out whichever hint is empty.
pub fn resource_args(resources: &Resources) -> Vec<String> {
    let mut requests = Vec::new();
    if !resources.mem.is_empty() {
        requests.push(format!("vf={}G", resources.mem));
    }
    if !resources.thread.is_empty() {
        requests.push(format!("p={}", resources.thread));
    }
    if requests.is_empty() {
        return Vec::new();
    }
    vec!["-l".to_string(), requests.join(",")]
}

pub struct SgeBackend {
    submitter: Box<dyn Submitter>,
    global_args: Vec<String>,
    fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for SgeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SgeBackend")
            .field("global_args", &self.global_args)
            .finish_non_exhaustive()
    }
}

impl SgeBackend {
    pub fn new(submitter: impl Submitter + 'static, sge: &SgeSection, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            submitter: Box::new(submitter),
            global_args: global_submit_args(sge),
            fs,
        }
    }

    /// Full argument list for one job: global flags, resources, row extras.
    pub fn submit_args_for(&self, job: &ScheduledJob) -> Vec<String> {
        let mut args = self.global_args.clone();
        args.extend(resource_args(&job.resources));
        args.extend(job.submit_args.iter().cloned());
        args
    }

    async fn run(&self, job: &ScheduledJob) -> Result<JobId> {
        if self.fs.exists(&job.completion_marker()) {
            info!(
                task = %job.task,
                job_key = %job.job_key,
                script = %job.script.display(),
                "skip complete script"
            );
            return Ok(JobId::new());
        }

        let args = self.submit_args_for(job);
        let jid = self
            .submitter
            .submit(&job.script, &job.hold, &args)
            .await
            .map_err(|e| BatchdagError::SubmitFailed {
                task: job.task.clone(),
                job_key: job.job_key.clone(),
                script: job.script.clone(),
                reason: format!("{e:#}"),
            })?;

        info!(
            task = %job.task,
            job_key = %job.job_key,
            hold = %job.hold.join(","),
            jid = %jid,
            "submitted"
        );
        Ok(jid)
    }
}

impl Backend for SgeBackend {
    fn execute<'a>(&'a self, job: &'a ScheduledJob) -> BackendFuture<'a> {
        Box::pin(self.run(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(PathBuf, Vec<JobId>, Vec<String>)>>,
    }

    impl Submitter for Recorder {
        fn submit<'a>(&'a self, script: &'a Path, hold: &'a [JobId], args: &'a [String]) -> SubmitFuture<'a> {
            Box::pin(async move {
                let mut calls = self.calls.lock().unwrap();
                calls.push((script.to_path_buf(), hold.to_vec(), args.to_vec()));
                Ok(format!("{}", 100 + calls.len()))
            })
        }
    }

    fn job() -> ScheduledJob {
        ScheduledJob {
            task: "bwa".to_string(),
            job_key: "S1".to_string(),
            script: PathBuf::from("/out/S1/shell/bwa.sh"),
            hold: vec!["11".to_string(), "12".to_string()],
            resources: Resources {
                mem: "8".to_string(),
                thread: "4".to_string(),
            },
            submit_args: vec!["-V".to_string()],
        }
    }

    #[test]
    fn parses_terse_output() {
        assert_eq!(parse_job_id("4242\n"), Some("4242".to_string()));
        assert_eq!(parse_job_id("\n77.1-10:1\n"), Some("77".to_string()));
        assert_eq!(parse_job_id("  \n"), None);
    }

    #[test]
    fn builds_submission_arguments_in_order() {
        let sge = SgeSection {
            cwd: true,
            project: Some("P1".to_string()),
            queue: Some("bc.q".to_string()),
        };
        let backend = SgeBackend::new(QsubSubmitter::new(), &sge, Arc::new(MockFileSystem::new()));
        assert_eq!(
            backend.submit_args_for(&job()),
            vec!["-cwd", "-q", "bc.q", "-P", "P1", "-l", "vf=8G,p=4", "-V"]
        );
        assert!(resource_args(&Resources::default()).is_empty());
    }

    #[tokio::test]
    async fn submits_with_hold_list_and_returns_scheduler_id() {
        let recorder = Arc::new(Recorder::default());
        let backend = SgeBackend::new(
            Arc::clone(&recorder),
            &SgeSection::default(),
            Arc::new(MockFileSystem::new()),
        );

        let jid = backend.execute(&job()).await.unwrap();
        assert_eq!(jid, "101");

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec!["11", "12"]);
        assert_eq!(calls[0].2, vec!["-l", "vf=8G,p=4", "-V"]);
    }

    #[tokio::test]
    async fn completed_scripts_are_not_submitted() {
        let recorder = Arc::new(Recorder::default());
        let fs = MockFileSystem::new();
        fs.add_file("/out/S1/shell/bwa.sh.complete", "");
        let backend = SgeBackend::new(Arc::clone(&recorder), &SgeSection::default(), Arc::new(fs));

        assert_eq!(backend.execute(&job()).await.unwrap(), "");
        assert!(recorder.calls.lock().unwrap().is_empty());
    }
}
