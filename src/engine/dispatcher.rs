// src/engine/dispatcher.rs

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::dag::{ChannelTable, TaskGraph};
use crate::engine::unit::{Unit, UnitKind, UnitReport};
use crate::engine::JobId;
use crate::entity::Population;
use crate::errors::{BatchdagError, Result};
use crate::exec::Backend;

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Units spawned, Start and End included.
    pub units: usize,
    /// Step units that went through the backend.
    pub jobs: usize,
    /// Non-empty ids End received from the last steps of every branch.
    pub end_hold: Vec<JobId>,
    /// Per-unit reports in completion order.
    pub reports: Vec<UnitReport>,
}

/// Spawns one unit per (task, job-key) and waits for the End barrier.
///
/// The graph and population are shared read-only; the backend is the only
/// piece of shared state units touch.
pub struct Dispatcher<B: Backend + 'static> {
    graph: Arc<TaskGraph>,
    population: Arc<Population>,
    backend: Arc<B>,
}

impl<B: Backend + 'static> std::fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tasks", &self.graph.steps().count())
            .field("samples", &self.population.sample_count())
            .field("barcodes", &self.population.barcode_count())
            .finish_non_exhaustive()
    }
}

impl<B: Backend + 'static> Dispatcher<B> {
    pub fn new(graph: Arc<TaskGraph>, population: Arc<Population>, backend: Arc<B>) -> Self {
        Self {
            graph,
            population,
            backend,
        }
    }

    /// Wire every unit up front, so a wiring error spawns nothing.
    pub fn wire(&self) -> Result<Vec<Unit>> {
        let mut table = ChannelTable::materialize(&self.graph);
        let mut units = Vec::new();
        for node in self.graph.nodes() {
            let task = self.graph.task(node);
            for key in task.job_keys(&self.population) {
                units.push(Unit::wire(
                    &self.graph,
                    &self.population,
                    &mut table,
                    node,
                    &key,
                )?);
            }
        }

        let unclaimed = table.unclaimed_senders() + table.unclaimed_receivers();
        if unclaimed > 0 {
            return Err(BatchdagError::ConfigError(format!(
                "{unclaimed} synchronization cell endpoints were never claimed"
            )));
        }
        Ok(units)
    }

    /// Run the whole graph to completion.
    ///
    /// Every unit is spawned before Start fires. The first failing unit
    /// aborts the rest; its error is returned in preference to the
    /// `UpstreamAborted` errors it causes downstream.
    pub async fn run(&self) -> Result<RunSummary> {
        let units = self.wire()?;
        let total = units.len();
        let jobs = units.iter().filter(|u| u.kind() == UnitKind::Step).count();
        info!(units = total, jobs, "spawning dispatch units");

        let mut set = JoinSet::new();
        for unit in units {
            let graph = Arc::clone(&self.graph);
            let backend = Arc::clone(&self.backend);
            set.spawn(async move { unit.run(&graph, backend.as_ref()).await });
        }

        let mut summary = RunSummary {
            units: total,
            jobs,
            ..RunSummary::default()
        };
        let mut failure: Option<BatchdagError> = None;

        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| BatchdagError::Other(e.into())).and_then(|r| r);
            match outcome {
                Ok(report) => {
                    debug!(task = %report.task, job_key = %report.job_key, id = %report.id, "unit finished");
                    if report.kind == UnitKind::End {
                        summary.end_hold = report.hold.clone();
                    }
                    summary.reports.push(report);
                }
                Err(err) => {
                    if failure.is_none() {
                        error!(error = %err, "unit failed; aborting run");
                        set.abort_all();
                    }
                    failure = Some(pick_root_cause(failure, err));
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        Ok(summary)
    }
}

/// Prefer a real failure over the `UpstreamAborted` it caused downstream and
/// over cancellations of aborted units.
fn pick_root_cause(current: Option<BatchdagError>, next: BatchdagError) -> BatchdagError {
    match current {
        None => next,
        Some(cur) if rank(&next) < rank(&cur) => next,
        Some(cur) => cur,
    }
}

fn rank(err: &BatchdagError) -> u8 {
    match err {
        BatchdagError::UpstreamAborted { .. } => 1,
        BatchdagError::Other(e) if e.downcast_ref::<tokio::task::JoinError>().is_some_and(|j| j.is_cancelled()) => 2,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_beats_upstream_aborted() {
        let upstream = BatchdagError::UpstreamAborted {
            task: "b".to_string(),
            job_key: "S1".to_string(),
            predecessor: "a".to_string(),
        };
        let failed = BatchdagError::TaskFailed {
            task: "a".to_string(),
            job_key: "S1".to_string(),
            script: "/out/S1/shell/a.sh".into(),
            code: 2,
        };

        let picked = pick_root_cause(Some(upstream), failed);
        assert!(matches!(picked, BatchdagError::TaskFailed { code: 2, .. }));
    }
}
