// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod entity;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod workdir;

use std::sync::Arc;

use tracing::info;

use crate::cli::CliArgs;
use crate::config::{RunOptions, exe_dir, load_sample_sheet, load_step_table};
use crate::dag::{Paths, TaskGraph};
use crate::engine::{Dispatcher, RunSummary};
use crate::entity::Population;
use crate::errors::Result;
use crate::exec::{LocalBackend, QsubSubmitter, SgeBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::RunMode;
use crate::workdir::Workdir;

/// High-level entry point used by `main.rs`.
///
/// Missing `--input` or `--outdir` prints usage and returns successfully.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let Some(opts) = RunOptions::resolve(&args, &exe_dir()?, argv)? else {
        cli::print_usage();
        info!("--input and --outdir required");
        return Ok(());
    };

    execute(&opts, Arc::new(RealFileSystem)).await?;
    Ok(())
}

/// Load, build, prepare the output root, then dispatch.
///
/// Every configuration error surfaces while building the graph, before
/// anything is written or spawned.
pub async fn execute(opts: &RunOptions, fs: Arc<dyn FileSystem>) -> Result<RunSummary> {
    let sheet = load_sample_sheet(&opts.input)?;
    let population = Population::from_sheet(&sheet, &opts.outdir)?;
    let table = load_step_table(&opts.cfg)?;
    let paths = Paths::new(&opts.outdir, &opts.local);
    let graph = TaskGraph::build(&table, &population, &paths)?;

    let workdir = Workdir::new(Arc::clone(&fs), paths, opts.mode);
    workdir.create_layout(&opts.layout, &population)?;
    workdir.record_input(&opts.input)?;
    workdir.record_invocation(&opts.argv)?;
    workdir.write_barcode_lists(&sheet, &population)?;
    workdir.write_plan(&graph)?;
    workdir.write_scripts(&graph)?;

    log_plan(&graph, &population);

    let graph = Arc::new(graph);
    let population = Arc::new(population);
    let summary = match opts.mode {
        RunMode::Local => {
            let mut backend = LocalBackend::new(opts.threshold, fs);
            if let Some(interval) = opts.dry_run {
                backend = backend.with_dry_run(interval);
            }
            info!(threshold = backend.threshold(), dry_run = opts.dry_run.is_some(), "running locally");
            Dispatcher::new(graph, population, Arc::new(backend)).run().await?
        }
        RunMode::Sge => {
            let backend = SgeBackend::new(QsubSubmitter::new(), &opts.sge, fs);
            info!(?backend, "submitting to SGE");
            Dispatcher::new(graph, population, Arc::new(backend)).run().await?
        }
    };

    info!(units = summary.units, jobs = summary.jobs, "All Done!");
    Ok(summary)
}

/// Log one line per step: granularity, predecessors and unit count.
pub fn log_plan(graph: &TaskGraph, population: &Population) {
    info!(
        steps = graph.steps().count(),
        edges = graph.edge_count(),
        samples = population.sample_count(),
        barcodes = population.barcode_count(),
        "dispatch plan"
    );
    for node in graph.steps() {
        let task = graph.task(node);
        info!(
            task = %task.name,
            granularity = %task.granularity,
            prior = %graph.predecessors_of(&task.name).join(","),
            units = task.scripts.len(),
            "plan"
        );
    }
}
