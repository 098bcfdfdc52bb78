// src/dag/task.rs

//! Task metadata and per-job-key script rendering.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::config::model::{RawRow, StepRow};
use crate::dag::router::job_keys;
use crate::engine::{JobId, JobKey, TaskName};
use crate::entity::Population;
use crate::errors::{BatchdagError, Result};
use crate::types::{BATCH_KEY, Granularity};

/// Name of the synthetic graph source.
pub const START_TASK: &str = "Start";
/// Name of the synthetic graph sink.
pub const END_TASK: &str = "End";

/// Roots used to render script paths and arguments.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Output root (`--outdir`).
    pub outdir: PathBuf,
    /// Pipeline install root (`--local`); templates live in `<local>/script/`.
    pub local: PathBuf,
}

impl Paths {
    pub fn new(outdir: impl Into<PathBuf>, local: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            local: local.into(),
        }
    }

    /// Consolidated sample list handed to batch steps as `list`.
    pub fn input_list(&self) -> PathBuf {
        self.outdir.join("input.list")
    }

    fn template_for(&self, step: &str) -> PathBuf {
        self.local.join("script").join(format!("{step}.sh"))
    }
}

/// A rendered wrapper script: where it is written and what it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptSpec {
    pub path: PathBuf,
    pub args: Vec<String>,
}

/// Memory (GB) and thread hints for cluster submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resources {
    pub mem: String,
    pub thread: String,
}

/// One node of the task graph.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    pub granularity: Granularity,
    /// Template script, `<local>/script/<name>.sh`.
    pub template: PathBuf,
    /// Template argument names, in order.
    pub args: Vec<String>,
    pub raw: RawRow,
    /// Rendered script per job-key.
    pub scripts: BTreeMap<JobKey, ScriptSpec>,
    /// Predecessor names, filled in while wiring edges.
    pub predecessors: Vec<TaskName>,
    pub resources: Resources,
    pub submit_args: Vec<String>,
    /// Only Start is a source.
    pub source: bool,
    /// Cleared once the task gains a successor; only End keeps it.
    pub sink: bool,
}

impl Task {
    /// Instantiate a task from a step row, rendering one script per job-key.
    pub fn from_row(row: &StepRow, paths: &Paths, population: &Population) -> Result<Self> {
        let mut task = Self {
            name: row.name.clone(),
            granularity: row.granularity,
            template: paths.template_for(&row.name),
            args: row.args.clone(),
            raw: row.raw.clone(),
            scripts: BTreeMap::new(),
            predecessors: Vec::new(),
            resources: Resources {
                mem: row.mem.clone(),
                thread: row.thread.clone(),
            },
            submit_args: row.submit_args.clone(),
            source: false,
            sink: true,
        };

        task.scripts = match task.granularity {
            Granularity::Sample => task.render_sample_scripts(paths, population)?,
            Granularity::Barcode => task.render_barcode_scripts(paths, population)?,
            Granularity::Batch => task.render_batch_script(paths)?,
        };

        Ok(task)
    }

    pub fn start() -> Self {
        Self::synthetic(START_TASK, true, false)
    }

    pub fn end() -> Self {
        Self::synthetic(END_TASK, false, true)
    }

    fn synthetic(name: &str, source: bool, sink: bool) -> Self {
        Self {
            name: name.to_string(),
            granularity: Granularity::Batch,
            template: PathBuf::new(),
            args: Vec::new(),
            raw: RawRow::new(),
            scripts: BTreeMap::new(),
            predecessors: Vec::new(),
            resources: Resources::default(),
            submit_args: Vec::new(),
            source,
            sink,
        }
    }

    /// Whether this is Start or End rather than a real step.
    pub fn is_synthetic(&self) -> bool {
        self.name == START_TASK || self.name == END_TASK
    }

    /// Job-keys this task runs for: one per sample, per barcode, or `"batch"`.
    pub fn job_keys(&self, population: &Population) -> Vec<JobKey> {
        job_keys(self.granularity, population)
    }

    pub fn script_for(&self, job_key: &str) -> Result<&ScriptSpec> {
        self.scripts
            .get(job_key)
            .ok_or_else(|| BatchdagError::MissingScript {
                task: self.name.clone(),
                job_key: job_key.to_string(),
            })
    }

    fn render_sample_scripts(
        &self,
        paths: &Paths,
        population: &Population,
    ) -> Result<BTreeMap<JobKey, ScriptSpec>> {
        let mut scripts = BTreeMap::new();
        for sample in population.samples() {
            let mut args = vec![
                path_arg(&paths.outdir),
                path_arg(&paths.local),
                sample.id.clone(),
            ];
            for arg in &self.args {
                let value = sample.attribute(arg).unwrap_or_else(|| {
                    warn!(
                        task = %self.name,
                        sample = %sample.id,
                        arg = %arg,
                        "no such sample attribute, passing empty value"
                    );
                    ""
                });
                args.push(value.to_string());
            }
            let path = paths
                .outdir
                .join(&sample.id)
                .join("shell")
                .join(format!("{}.sh", self.name));
            scripts.insert(sample.id.clone(), ScriptSpec { path, args });
        }
        Ok(scripts)
    }

    fn render_barcode_scripts(
        &self,
        paths: &Paths,
        population: &Population,
    ) -> Result<BTreeMap<JobKey, ScriptSpec>> {
        let mut scripts = BTreeMap::new();
        for barcode in population.barcodes() {
            let mut args = vec![path_arg(&paths.outdir), path_arg(&paths.local)];
            for arg in &self.args {
                match arg.as_str() {
                    "barcode" => args.push(barcode.id.clone()),
                    "fq1" => args.push(barcode.fq1.clone()),
                    "fq2" => args.push(barcode.fq2.clone()),
                    "list" => args.push(path_arg(&barcode.list)),
                    _ => self.skip_argument(&barcode.id, arg),
                }
            }
            let path = paths
                .outdir
                .join("shell")
                .join(format!("barcode.{}.{}.sh", barcode.id, self.name));
            scripts.insert(barcode.id.clone(), ScriptSpec { path, args });
        }
        Ok(scripts)
    }

    fn render_batch_script(&self, paths: &Paths) -> Result<BTreeMap<JobKey, ScriptSpec>> {
        let mut args = vec![path_arg(&paths.outdir), path_arg(&paths.local)];
        for arg in &self.args {
            match arg.as_str() {
                "list" => args.push(path_arg(&paths.input_list())),
                _ => self.skip_argument(BATCH_KEY, arg),
            }
        }
        let path = paths.outdir.join("shell").join(format!("{}.sh", self.name));
        Ok(BTreeMap::from([(
            BATCH_KEY.to_string(),
            ScriptSpec { path, args },
        )]))
    }

    fn skip_argument(&self, job_key: &str, arg: &str) {
        warn!(task = %self.name, job_key = %job_key, arg = %arg, "unknown argument skipped");
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Description of one (task, job-key) instance that a backend should run now.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub task: TaskName,
    pub job_key: JobKey,
    pub script: PathBuf,
    /// De-duplicated, sorted identifiers collected from predecessors.
    pub hold: Vec<JobId>,
    pub resources: Resources,
    pub submit_args: Vec<String>,
}

impl ScheduledJob {
    pub fn for_unit(task: &Task, job_key: &str, hold: Vec<JobId>) -> Result<Self> {
        let script = task.script_for(job_key)?;
        Ok(Self {
            task: task.name.clone(),
            job_key: job_key.to_string(),
            script: script.path.clone(),
            hold,
            resources: task.resources.clone(),
            submit_args: task.submit_args.clone(),
        })
    }

    /// Identifier a local run hands to its successors, e.g. `bwa[S1]`.
    pub fn local_id(&self) -> JobId {
        format!("{}[{}]", self.task, self.job_key)
    }

    /// `<script>.complete`; its existence marks the job as already done.
    pub fn completion_marker(&self) -> PathBuf {
        let mut marker = self.script.clone().into_os_string();
        marker.push(".complete");
        PathBuf::from(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::SampleSheet;

    fn population() -> Population {
        let rows = [("S1", "BC1", "t1"), ("S2", "BC1", "t2")]
            .iter()
            .map(|(id, bc, tissue)| {
                RawRow::from([
                    ("sampleID".to_string(), id.to_string()),
                    ("barcode".to_string(), bc.to_string()),
                    ("fq1".to_string(), "r_1.fq.gz".to_string()),
                    ("fq2".to_string(), "r_2.fq.gz".to_string()),
                    ("tissue".to_string(), tissue.to_string()),
                ])
            })
            .collect();
        let sheet = SampleSheet {
            headers: Vec::new(),
            rows,
        };
        Population::from_sheet(&sheet, Path::new("/out")).unwrap()
    }

    fn row(name: &str, granularity: Granularity, args: &[&str]) -> StepRow {
        StepRow {
            name: name.to_string(),
            granularity,
            args: args.iter().map(|s| s.to_string()).collect(),
            mem: "4".to_string(),
            thread: "2".to_string(),
            prior: Vec::new(),
            submit_args: Vec::new(),
            raw: RawRow::new(),
        }
    }

    #[test]
    fn sample_scripts_substitute_attributes() {
        let paths = Paths::new("/out", "/pipe");
        let task = Task::from_row(&row("bwa", Granularity::Sample, &["tissue"]), &paths, &population())
            .unwrap();

        assert_eq!(task.template, PathBuf::from("/pipe/script/bwa.sh"));
        let s1 = task.script_for("S1").unwrap();
        assert_eq!(s1.path, PathBuf::from("/out/S1/shell/bwa.sh"));
        assert_eq!(s1.args, vec!["/out", "/pipe", "S1", "t1"]);
        assert_eq!(task.scripts.len(), 2);
        assert!(task.sink);
    }

    #[test]
    fn barcode_and_batch_scripts_use_derived_values() {
        let paths = Paths::new("/out", "/pipe");
        let pop = population();

        let split = Task::from_row(
            &row("split", Granularity::Barcode, &["barcode", "fq1", "list"]),
            &paths,
            &pop,
        )
        .unwrap();
        let bc1 = split.script_for("BC1").unwrap();
        assert_eq!(bc1.path, PathBuf::from("/out/shell/barcode.BC1.split.sh"));
        assert_eq!(
            bc1.args,
            vec!["/out", "/pipe", "BC1", "r_1.fq.gz", "/out/barcode/barcode.BC1.list"]
        );

        let merge = Task::from_row(&row("merge", Granularity::Batch, &["list"]), &paths, &pop).unwrap();
        let batch = merge.script_for(BATCH_KEY).unwrap();
        assert_eq!(batch.args, vec!["/out", "/pipe", "/out/input.list"]);
    }

    #[test]
    fn missing_sample_attribute_passes_empty_value() {
        let paths = Paths::new("/out", "/pipe");
        // A short row: the flexible reader leaves `tissue` absent.
        let short = Population::from_sheet(
            &SampleSheet {
                headers: Vec::new(),
                rows: vec![RawRow::from([
                    ("sampleID".to_string(), "S3".to_string()),
                    ("barcode".to_string(), "BC2".to_string()),
                ])],
            },
            Path::new("/out"),
        )
        .unwrap();

        let task = Task::from_row(&row("bwa", Granularity::Sample, &["tissue", "nope"]), &paths, &short)
            .unwrap();
        assert_eq!(task.script_for("S3").unwrap().args, vec!["/out", "/pipe", "S3", "", ""]);
    }

    #[test]
    fn unknown_barcode_and_batch_arguments_are_skipped() {
        let paths = Paths::new("/out", "/pipe");
        let pop = population();

        let split = Task::from_row(&row("split", Granularity::Barcode, &["lane", "barcode"]), &paths, &pop)
            .unwrap();
        assert_eq!(split.script_for("BC1").unwrap().args, vec!["/out", "/pipe", "BC1"]);

        let merge = Task::from_row(&row("merge", Granularity::Batch, &["list", "lane"]), &paths, &pop)
            .unwrap();
        assert_eq!(
            merge.script_for(BATCH_KEY).unwrap().args,
            vec!["/out", "/pipe", "/out/input.list"]
        );
    }

    #[test]
    fn scheduled_job_ids_and_marker() {
        let paths = Paths::new("/out", "/pipe");
        let task = Task::from_row(&row("bwa", Granularity::Sample, &[]), &paths, &population()).unwrap();
        let job = ScheduledJob::for_unit(&task, "S2", vec![]).unwrap();
        assert_eq!(job.local_id(), "bwa[S2]");
        assert_eq!(job.completion_marker(), PathBuf::from("/out/S2/shell/bwa.sh.complete"));
        assert!(ScheduledJob::for_unit(&task, "S9", vec![]).is_err());
    }
}
