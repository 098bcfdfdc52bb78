// src/workdir/provenance.rs

//! Files that record what a run was asked to do.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::model::SampleSheet;
use crate::dag::{ScriptSpec, TaskGraph};
use crate::engine::JobKey;
use crate::entity::Population;
use crate::errors::{BatchdagError, Result};
use crate::types::Granularity;
use crate::workdir::Workdir;

/// One entry of `steps.json`.
#[derive(Debug, Clone, Serialize)]
pub struct StepPlan<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub granularity: Granularity,
    pub prior: Vec<&'a str>,
    pub successors: Vec<&'a str>,
    pub mem: &'a str,
    pub thread: &'a str,
    pub submit_args: &'a [String],
    pub scripts: &'a BTreeMap<JobKey, ScriptSpec>,
}

/// The plan of every real step, in table order.
pub fn plan_of(graph: &TaskGraph) -> Vec<StepPlan<'_>> {
    graph
        .steps()
        .map(|node| {
            let task = graph.task(node);
            StepPlan {
                name: &task.name,
                granularity: task.granularity,
                prior: graph.predecessors_of(&task.name),
                successors: graph.successors_of(&task.name),
                mem: &task.resources.mem,
                thread: &task.resources.thread,
                submit_args: &task.submit_args,
                scripts: &task.scripts,
            }
        })
        .collect()
}

impl Workdir {
    /// Copy the sample list to `<outdir>/input.list`.
    pub fn record_input(&self, input: &Path) -> Result<()> {
        let contents = self.fs().read(input)?;
        let target = self.paths().input_list();
        self.fs().write(&target, &contents)?;
        debug!(from = %input.display(), to = %target.display(), "sample list copied");
        Ok(())
    }

    /// Write the invocation, space-joined, to `<outdir>/run.sh`.
    pub fn record_invocation(&self, argv: &[String]) -> Result<()> {
        let mut line = argv.join(" ");
        line.push('\n');
        self.fs().write(&self.paths().outdir.join("run.sh"), line.as_bytes())?;
        Ok(())
    }

    /// Write the task plan to `<outdir>/steps.json`.
    pub fn write_plan(&self, graph: &TaskGraph) -> Result<()> {
        let plan = plan_of(graph);
        let json = serde_json::to_vec_pretty(&plan)?;
        self.fs().write(&self.paths().outdir.join("steps.json"), &json)?;
        Ok(())
    }

    /// One TSV per barcode with the sample list header and its member rows,
    /// in input order.
    pub fn write_barcode_lists(&self, sheet: &SampleSheet, population: &Population) -> Result<()> {
        for barcode in population.barcodes() {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .quote_style(csv::QuoteStyle::Never)
                .from_writer(Vec::new());
            writer.write_record(&sheet.headers)?;

            for row in sheet.rows.iter() {
                let member = row
                    .get("sampleID")
                    .is_some_and(|id| barcode.samples.iter().any(|s| s == id.trim()));
                if member {
                    writer.write_record(
                        sheet
                            .headers
                            .iter()
                            .map(|h| row.get(h).map(String::as_str).unwrap_or("")),
                    )?;
                }
            }

            let bytes = writer
                .into_inner()
                .map_err(|e| BatchdagError::IoError(e.into_error()))?;
            self.fs().write(&barcode.list, &bytes)?;
        }
        info!(barcodes = population.barcode_count(), "barcode lists written");
        Ok(())
    }
}
