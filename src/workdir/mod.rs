// src/workdir/mod.rs

//! Everything batchdag writes under the output root before dispatch.
//!
//! - [`script`] renders the per-job-key wrapper scripts.
//! - [`provenance`] records the run: `input.list`, `run.sh`, `steps.json`
//!   and the per-barcode sample lists.
//!
//! All writes go through [`FileSystem`] so tests can use the in-memory mock.

pub mod provenance;
pub mod script;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::model::LayoutSection;
use crate::dag::{Paths, TaskGraph};
use crate::entity::Population;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::RunMode;

pub use provenance::{StepPlan, plan_of};
pub use script::render_wrapper;

/// The output root of one run.
#[derive(Debug, Clone)]
pub struct Workdir {
    fs: Arc<dyn FileSystem>,
    paths: Paths,
    mode: RunMode,
}

impl Workdir {
    pub fn new(fs: Arc<dyn FileSystem>, paths: Paths, mode: RunMode) -> Self {
        Self { fs, paths, mode }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Directories to create: batch dirs, `barcode/`, then every sample dir.
    pub fn layout_dirs(&self, layout: &LayoutSection, population: &Population) -> Vec<PathBuf> {
        let outdir = &self.paths.outdir;
        let mut dirs: Vec<PathBuf> = layout.batch_dirs.iter().map(|d| outdir.join(d)).collect();
        dirs.push(outdir.join("barcode"));
        for sample in population.samples() {
            for sub in layout.sample_dirs.iter() {
                dirs.push(outdir.join(&sample.id).join(sub));
            }
        }
        dirs
    }

    pub fn create_layout(&self, layout: &LayoutSection, population: &Population) -> Result<()> {
        let dirs = self.layout_dirs(layout, population);
        for dir in dirs.iter() {
            self.fs.create_dir_all(dir)?;
        }
        debug!(dirs = dirs.len(), outdir = %self.paths.outdir.display(), "working directories created");
        Ok(())
    }

    /// Write the wrapper script of every job-key of every step.
    pub fn write_scripts(&self, graph: &TaskGraph) -> Result<usize> {
        let mut written = 0;
        for node in graph.steps() {
            let task = graph.task(node);
            for spec in task.scripts.values() {
                let text = render_wrapper(&task.template, spec, self.mode);
                self.fs.write(&spec.path, text.as_bytes())?;
                written += 1;
            }
        }
        info!(scripts = written, "wrapper scripts written");
        Ok(written)
    }
}
