// src/dag/channel.rs

//! Second construction pass: one capacity-one cell per (edge, job-key).
//!
//! Cells are `tokio::sync::oneshot` pairs. Every dispatch unit takes the
//! endpoints it needs out of the table by value before anything is spawned,
//! so no endpoint is ever shared between units.

use std::collections::HashMap;

use petgraph::graph::EdgeIndex;
use tokio::sync::oneshot;

use crate::dag::graph::TaskGraph;
use crate::engine::{JobId, JobKey};
use crate::errors::{BatchdagError, Result};

type CellId = (EdgeIndex, JobKey);

#[derive(Debug, Default)]
pub struct ChannelTable {
    senders: HashMap<CellId, oneshot::Sender<JobId>>,
    receivers: HashMap<CellId, oneshot::Receiver<JobId>>,
}

impl ChannelTable {
    /// Allocate every cell named by the graph's edges.
    pub fn materialize(graph: &TaskGraph) -> Self {
        let mut table = Self::default();
        for (edge, weight) in graph.edges() {
            for key in weight.cells.iter() {
                let (tx, rx) = oneshot::channel::<JobId>();
                table.senders.insert((edge, key.clone()), tx);
                table.receivers.insert((edge, key.clone()), rx);
            }
        }
        table
    }

    pub fn take_sender(
        &mut self,
        graph: &TaskGraph,
        edge: EdgeIndex,
        key: &str,
    ) -> Result<oneshot::Sender<JobId>> {
        self.senders
            .remove(&(edge, key.to_string()))
            .ok_or_else(|| missing_cell(graph, edge, key))
    }

    pub fn take_receiver(
        &mut self,
        graph: &TaskGraph,
        edge: EdgeIndex,
        key: &str,
    ) -> Result<oneshot::Receiver<JobId>> {
        self.receivers
            .remove(&(edge, key.to_string()))
            .ok_or_else(|| missing_cell(graph, edge, key))
    }

    /// Cells whose writer end nobody has claimed yet.
    pub fn unclaimed_senders(&self) -> usize {
        self.senders.len()
    }

    /// Cells whose reader end nobody has claimed yet.
    pub fn unclaimed_receivers(&self) -> usize {
        self.receivers.len()
    }
}

fn missing_cell(graph: &TaskGraph, edge: EdgeIndex, key: &str) -> BatchdagError {
    let (producer, consumer) = graph
        .edge_endpoints(edge)
        .map(|(a, b)| (a.name.clone(), b.name.clone()))
        .unwrap_or_default();
    BatchdagError::MissingCell {
        producer,
        consumer,
        job_key: key.to_string(),
    }
}
