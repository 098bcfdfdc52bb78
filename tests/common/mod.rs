#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use batchdag::config::StepTable;
use batchdag::dag::{Paths, TaskGraph};
use batchdag::engine::{Dispatcher, RunSummary};
use batchdag::entity::Population;
use batchdag::errors::Result;
use batchdag::exec::Backend;

pub use batchdag_test_utils::{
    FakeBackend, SampleSheetBuilder, StepRowBuilder, StepTableBuilder, init_tracing, with_timeout,
};

/// Two samples sharing one barcode.
pub fn two_samples_one_barcode() -> SampleSheetBuilder {
    SampleSheetBuilder::new()
        .sample("S1", "BC1")
        .sample("S2", "BC1")
}

pub fn build_graph(table: &StepTable, population: &Population) -> Result<TaskGraph> {
    TaskGraph::build(table, population, &Paths::new("/out", "/pipe"))
}

/// Build the graph and run it against `backend` under a timeout.
pub async fn dispatch<B: Backend + 'static>(
    table: &StepTable,
    population: Population,
    backend: Arc<B>,
) -> Result<RunSummary> {
    let graph = build_graph(table, &population)?;
    let dispatcher = Dispatcher::new(Arc::new(graph), Arc::new(population), backend);
    with_timeout(dispatcher.run()).await
}

/// Write a file, creating parent directories.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
