// tests/sge_chaining.rs

mod common;
use crate::common::{StepRowBuilder, StepTableBuilder, dispatch, init_tracing, two_samples_one_barcode, write_file};

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use batchdag::config::SgeSection;
use batchdag::engine::JobId;
use batchdag::exec::{QsubSubmitter, SgeBackend, SubmitFuture, Submitter};
use batchdag::fs::mock::MockFileSystem;

type TestResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Clone)]
struct Submission {
    script: PathBuf,
    hold: Vec<JobId>,
    args: Vec<String>,
    jid: JobId,
}

/// Hands out ids 1000, 1001, ... and records every submission.
#[derive(Default)]
struct FakeQsub {
    next: AtomicUsize,
    log: Mutex<Vec<Submission>>,
}

impl FakeQsub {
    fn by_script(&self, suffix: &str) -> Submission {
        self.log
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.script.ends_with(suffix))
            .cloned()
            .unwrap_or_else(|| panic!("no submission for {suffix}"))
    }
}

impl Submitter for FakeQsub {
    fn submit<'a>(&'a self, script: &'a Path, hold: &'a [JobId], args: &'a [String]) -> SubmitFuture<'a> {
        Box::pin(async move {
            let jid = (1000 + self.next.fetch_add(1, Ordering::SeqCst)).to_string();
            self.log.lock().unwrap().push(Submission {
                script: script.to_path_buf(),
                hold: hold.to_vec(),
                args: args.to_vec(),
                jid: jid.clone(),
            });
            Ok(jid)
        })
    }
}

#[tokio::test]
async fn submissions_hold_on_predecessor_job_ids() -> TestResult {
    init_tracing();

    let table = StepTableBuilder::new()
        .step("A", "sample", "", "")
        .step_with(
            StepRowBuilder::new("B", "batch")
                .prior("A")
                .mem("16")
                .thread("8")
                .submit_args("-V  -l h=node01"),
        )
        .build();
    let qsub = Arc::new(FakeQsub::default());
    let sge = SgeSection {
        cwd: true,
        project: Some("P1".to_string()),
        queue: None,
    };
    let backend = Arc::new(SgeBackend::new(Arc::clone(&qsub), &sge, Arc::new(MockFileSystem::new())));

    let summary = dispatch(&table, two_samples_one_barcode().population("/out"), backend).await?;

    let a1 = qsub.by_script("S1/shell/A.sh");
    let a2 = qsub.by_script("S2/shell/A.sh");
    assert!(a1.hold.is_empty());
    assert_eq!(a1.args, vec!["-cwd", "-P", "P1", "-l", "vf=1G,p=1"]);

    let b = qsub.by_script("shell/B.sh");
    let mut expected = vec![a1.jid.clone(), a2.jid.clone()];
    expected.sort();
    assert_eq!(b.hold, expected);
    assert_eq!(
        b.args,
        vec!["-cwd", "-P", "P1", "-l", "vf=16G,p=8", "-V", "-l", "h=node01"]
    );
    assert_eq!(summary.end_hold, vec![b.jid]);
    Ok(())
}

#[tokio::test]
async fn completed_scripts_are_not_submitted_and_drop_out_of_holds() -> TestResult {
    init_tracing();

    let table = StepTableBuilder::new()
        .step("A", "sample", "", "")
        .step("B", "sample", "", "A")
        .build();
    let fs = MockFileSystem::new();
    fs.add_file("/out/S1/shell/A.sh.complete", "");
    let qsub = Arc::new(FakeQsub::default());
    let backend = Arc::new(SgeBackend::new(Arc::clone(&qsub), &SgeSection::default(), Arc::new(fs)));

    dispatch(&table, two_samples_one_barcode().population("/out"), backend).await?;

    assert_eq!(qsub.log.lock().unwrap().len(), 3);
    assert!(qsub.by_script("S1/shell/B.sh").hold.is_empty());
    let a2 = qsub.by_script("S2/shell/A.sh");
    assert_eq!(qsub.by_script("S2/shell/B.sh").hold, vec![a2.jid]);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn qsub_submitter_passes_terse_hold_and_args() -> TestResult {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let stub = dir.path().join("qsub");
    let calls = dir.path().join("calls.txt");
    write_file(
        &stub,
        &format!("#!/bin/bash\necho \"$@\" >> {}\necho 4242.1-2:1\n", calls.display()),
    );
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755))?;

    let submitter = QsubSubmitter::with_program(stub.to_string_lossy());
    let jid = submitter
        .submit(
            Path::new("/out/shell/merge.sh"),
            &["11".to_string(), "12".to_string()],
            &["-cwd".to_string()],
        )
        .await?;

    assert_eq!(jid, "4242");
    assert_eq!(
        std::fs::read_to_string(&calls)?,
        "-terse -hold_jid 11,12 -cwd /out/shell/merge.sh\n"
    );
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn qsub_failure_is_reported() -> TestResult {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let stub = dir.path().join("qsub");
    write_file(&stub, "#!/bin/bash\necho 'Unable to run job' >&2\nexit 1\n");
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755))?;

    let submitter = QsubSubmitter::with_program(stub.to_string_lossy());
    let err = submitter
        .submit(Path::new("/out/shell/merge.sh"), &[], &[])
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Unable to run job"));
    Ok(())
}
