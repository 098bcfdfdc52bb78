// src/engine/unit.rs

//! One dispatch unit per (task, job-key).

use std::collections::BTreeSet;
use std::fmt;

use petgraph::graph::NodeIndex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::dag::{ChannelTable, ScheduledJob, TaskGraph};
use crate::engine::{JobId, JobKey, TaskName};
use crate::entity::Population;
use crate::errors::{BatchdagError, Result};
use crate::exec::Backend;

/// What a unit does between its wait and signal phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Sends `""` to every cell of its out-edges.
    Start,
    /// Runs the job through the backend.
    Step,
    /// Receives every cell of every in-edge; the global barrier.
    End,
}

/// A cell this unit reads before it may run.
struct Inbound {
    predecessor: TaskName,
    key: JobKey,
    rx: oneshot::Receiver<JobId>,
}

/// A cell this unit fills once it has a result.
struct Outbound {
    successor: TaskName,
    key: JobKey,
    tx: oneshot::Sender<JobId>,
}

/// Result of a finished unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub task: TaskName,
    pub job_key: JobKey,
    pub kind: UnitKind,
    /// Ids received from predecessors, de-duplicated and without `""`.
    pub hold: Vec<JobId>,
    /// What was sent to successors.
    pub id: JobId,
}

pub struct Unit {
    node: NodeIndex,
    task: TaskName,
    job_key: JobKey,
    kind: UnitKind,
    inbound: Vec<Inbound>,
    outbound: Vec<Outbound>,
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("task", &self.task)
            .field("job_key", &self.job_key)
            .field("kind", &self.kind)
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .finish()
    }
}

impl Unit {
    /// Take this unit's endpoints out of `table`.
    ///
    /// For every in-edge the router's wait keys name the receivers; for
    /// every out-edge its signal keys name the senders. Each endpoint can be
    /// taken once, so two units claiming the same cell is an error.
    pub fn wire(
        graph: &TaskGraph,
        population: &Population,
        table: &mut ChannelTable,
        node: NodeIndex,
        job_key: &str,
    ) -> Result<Self> {
        let task = graph.task(node);
        let kind = if node == graph.start() {
            UnitKind::Start
        } else if node == graph.end() {
            UnitKind::End
        } else {
            UnitKind::Step
        };

        let mut inbound = Vec::new();
        for link in graph.incoming(node) {
            for key in link.weight.route.wait_keys(job_key, population) {
                let rx = table.take_receiver(graph, link.edge, &key)?;
                inbound.push(Inbound {
                    predecessor: link.peer.name.clone(),
                    key,
                    rx,
                });
            }
        }

        let mut outbound = Vec::new();
        for link in graph.outgoing(node) {
            for key in link.weight.route.signal_keys(job_key, population) {
                let tx = table.take_sender(graph, link.edge, &key)?;
                outbound.push(Outbound {
                    successor: link.peer.name.clone(),
                    key,
                    tx,
                });
            }
        }

        Ok(Self {
            node,
            task: task.name.clone(),
            job_key: job_key.to_string(),
            kind,
            inbound,
            outbound,
        })
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn job_key(&self) -> &str {
        &self.job_key
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    /// Wait, run, signal.
    ///
    /// Dropping a unit half-way (abort, or an error below) drops its
    /// senders, which successors observe as `UpstreamAborted`.
    pub async fn run<B: Backend + ?Sized>(self, graph: &TaskGraph, backend: &B) -> Result<UnitReport> {
        let Unit {
            node,
            task,
            job_key,
            kind,
            inbound,
            outbound,
        } = self;

        let hold = wait_all(&task, &job_key, inbound).await?;

        let id = match kind {
            UnitKind::Start | UnitKind::End => JobId::new(),
            UnitKind::Step => {
                let job = ScheduledJob::for_unit(graph.task(node), &job_key, hold.clone())?;
                backend.execute(&job).await?
            }
        };

        if kind == UnitKind::End {
            info!(task = %task, hold = %hold.join(","), "all units reached End");
        } else {
            debug!(task = %task, job_key = %job_key, id = %id, "signalling successors");
        }
        signal_all(&task, &job_key, &id, outbound);

        Ok(UnitReport {
            task,
            job_key,
            kind,
            hold,
            id,
        })
    }
}

/// Receive every inbound cell; non-empty ids form the sorted hold set.
async fn wait_all(task: &str, job_key: &str, inbound: Vec<Inbound>) -> Result<Vec<JobId>> {
    let mut hold = BTreeSet::new();
    for cell in inbound {
        debug!(
            task = %task,
            job_key = %job_key,
            predecessor = %cell.predecessor,
            cell = %cell.key,
            "waiting"
        );
        let id = cell.rx.await.map_err(|_| BatchdagError::UpstreamAborted {
            task: task.to_string(),
            job_key: job_key.to_string(),
            predecessor: cell.predecessor.clone(),
        })?;
        if !id.is_empty() {
            hold.insert(id);
        }
    }
    Ok(hold.into_iter().collect())
}

fn signal_all(task: &str, job_key: &str, id: &str, outbound: Vec<Outbound>) {
    for cell in outbound {
        if cell.tx.send(id.to_string()).is_err() {
            // Receiver already gone: the run is being torn down.
            debug!(
                task = %task,
                job_key = %job_key,
                successor = %cell.successor,
                cell = %cell.key,
                "successor dropped before signal"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;
    use crate::config::model::{RawRow, SampleSheet, StepRow, StepTable};
    use crate::dag::Paths;
    use crate::exec::BackendFuture;
    use crate::types::{BATCH_KEY, Granularity};

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<ScheduledJob>>,
    }

    impl Backend for Echo {
        fn execute<'a>(&'a self, job: &'a ScheduledJob) -> BackendFuture<'a> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(job.clone());
                Ok(job.local_id())
            })
        }
    }

    fn fixture() -> (TaskGraph, Population) {
        let rows = [("S1", "BC1"), ("S2", "BC1")]
            .iter()
            .map(|(id, bc)| {
                RawRow::from([
                    ("sampleID".to_string(), id.to_string()),
                    ("barcode".to_string(), bc.to_string()),
                ])
            })
            .collect();
        let pop = Population::from_sheet(
            &SampleSheet {
                headers: Vec::new(),
                rows,
            },
            Path::new("/out"),
        )
        .unwrap();

        let row = |name: &str, granularity, prior: &[&str]| StepRow {
            name: name.to_string(),
            granularity,
            args: Vec::new(),
            mem: String::new(),
            thread: String::new(),
            prior: prior.iter().map(|s| s.to_string()).collect(),
            submit_args: Vec::new(),
            raw: RawRow::new(),
        };
        let table = StepTable::new_unchecked(vec![
            row("filter", Granularity::Sample, &[]),
            row("merge", Granularity::Batch, &["filter"]),
        ]);
        let graph = TaskGraph::build(&table, &pop, &Paths::new("/out", "/pipe")).unwrap();
        (graph, pop)
    }

    #[tokio::test]
    async fn batch_unit_holds_on_every_sample() {
        let (graph, pop) = fixture();
        let mut table = ChannelTable::materialize(&graph);
        let filter = graph.node_of("filter").unwrap();
        let merge = graph.node_of("merge").unwrap();

        let start = Unit::wire(&graph, &pop, &mut table, graph.start(), BATCH_KEY).unwrap();
        let s1 = Unit::wire(&graph, &pop, &mut table, filter, "S1").unwrap();
        let s2 = Unit::wire(&graph, &pop, &mut table, filter, "S2").unwrap();
        let batch = Unit::wire(&graph, &pop, &mut table, merge, BATCH_KEY).unwrap();
        let end = Unit::wire(&graph, &pop, &mut table, graph.end(), BATCH_KEY).unwrap();
        assert_eq!(table.unclaimed_senders(), 0);
        assert_eq!(table.unclaimed_receivers(), 0);

        let backend = Echo::default();
        let (_, r1, r2, rb, re) = tokio::join!(
            start.run(&graph, &backend),
            s1.run(&graph, &backend),
            s2.run(&graph, &backend),
            batch.run(&graph, &backend),
            end.run(&graph, &backend),
        );

        assert!(r1.unwrap().hold.is_empty());
        assert_eq!(r2.unwrap().id, "filter[S2]");
        assert_eq!(rb.unwrap().hold, vec!["filter[S1]", "filter[S2]"]);
        assert_eq!(re.unwrap().hold, vec!["merge[batch]"]);
        assert_eq!(backend.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn dropped_predecessor_is_upstream_aborted() {
        let (graph, pop) = fixture();
        let mut table = ChannelTable::materialize(&graph);
        let filter = graph.node_of("filter").unwrap();

        let start = Unit::wire(&graph, &pop, &mut table, graph.start(), BATCH_KEY).unwrap();
        let s1 = Unit::wire(&graph, &pop, &mut table, filter, "S1").unwrap();
        drop(start);

        let err = s1.run(&graph, &Echo::default()).await.unwrap_err();
        assert!(matches!(
            err,
            BatchdagError::UpstreamAborted { ref predecessor, .. } if predecessor == "Start"
        ));
    }

    #[test]
    fn claiming_a_cell_twice_fails() {
        let (graph, pop) = fixture();
        let mut table = ChannelTable::materialize(&graph);
        let filter = graph.node_of("filter").unwrap();

        Unit::wire(&graph, &pop, &mut table, filter, "S1").unwrap();
        let err = Unit::wire(&graph, &pop, &mut table, filter, "S1").unwrap_err();
        assert!(matches!(err, BatchdagError::MissingCell { .. }));
    }
}
