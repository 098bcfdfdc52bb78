// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

use crate::config::model::StepTable;
use crate::dag::router::Route;
use crate::dag::task::{END_TASK, Paths, START_TASK, Task};
use crate::engine::{JobKey, TaskName};
use crate::entity::Population;
use crate::errors::{BatchdagError, Result};

/// Edge weight: routing rule plus the cells to allocate on this edge.
#[derive(Debug, Clone)]
pub struct Edge {
    pub route: Route,
    pub cells: Vec<JobKey>,
}

/// One side of an edge as seen from a node.
#[derive(Debug, Clone, Copy)]
pub struct Link<'a> {
    pub edge: EdgeIndex,
    /// The task on the other end of the edge.
    pub peer: &'a Task,
    pub weight: &'a Edge,
}

/// The task graph: steps plus synthetic Start and End.
///
/// Built once, single-threaded, then shared read-only (behind an `Arc`) by
/// every dispatch unit. Channels are not stored here; they are materialized
/// from the edges by [`crate::dag::ChannelTable`].
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<Task, Edge>,
    index: HashMap<TaskName, NodeIndex>,
    start: NodeIndex,
    end: NodeIndex,
}

impl TaskGraph {
    /// Build the graph from a validated step table.
    ///
    /// Fails on duplicate task names, on `prior` references to undefined or
    /// self tasks, on unresolvable template arguments and on granularity
    /// pairs missing from the routing table. Nothing is spawned or written.
    pub fn build(table: &StepTable, population: &Population, paths: &Paths) -> Result<Self> {
        let mut graph: DiGraph<Task, Edge> = DiGraph::new();
        let mut index: HashMap<TaskName, NodeIndex> = HashMap::new();

        let start = graph.add_node(Task::start());
        index.insert(START_TASK.to_string(), start);

        // First pass: one node per step.
        for row in table.steps.iter() {
            if index.contains_key(&row.name) {
                return Err(BatchdagError::DuplicateTask(row.name.clone()));
            }
            let task = Task::from_row(row, paths, population)?;
            let node = graph.add_node(task);
            index.insert(row.name.clone(), node);
        }

        let end = graph.add_node(Task::end());
        index.insert(END_TASK.to_string(), end);

        let mut builder = Self {
            graph,
            index,
            start,
            end,
        };

        // Second pass: dependency edges.
        for row in table.steps.iter() {
            let node = builder.index[&row.name];

            if row.prior.is_empty() {
                builder.link(start, node, population)?;
                continue;
            }

            let mut seen: Vec<&str> = Vec::new();
            for prior in row.prior.iter() {
                if seen.contains(&prior.as_str()) {
                    warn!(task = %row.name, prior = %prior, "duplicate entry in `prior`; ignoring");
                    continue;
                }
                seen.push(prior);

                if prior == &row.name {
                    return Err(BatchdagError::ConfigError(format!(
                        "task '{}' cannot list itself in `prior`",
                        row.name
                    )));
                }
                let from = *builder.index.get(prior).ok_or_else(|| BatchdagError::UnknownPrior {
                    task: row.name.clone(),
                    prior: prior.clone(),
                })?;
                builder.link(from, node, population)?;
                builder.graph[from].sink = false;
            }
        }

        // Remaining sinks feed End.
        let sinks: Vec<NodeIndex> = builder
            .graph
            .node_indices()
            .filter(|&n| n != end && builder.graph[n].sink)
            .collect();
        for node in sinks {
            builder.link(node, end, population)?;
            builder.graph[node].sink = false;
        }

        debug!(
            tasks = builder.graph.node_count(),
            edges = builder.graph.edge_count(),
            "task graph built"
        );

        Ok(builder)
    }

    fn link(&mut self, from: NodeIndex, to: NodeIndex, population: &Population) -> Result<()> {
        let route = Route::resolve(self.graph[from].granularity, self.graph[to].granularity)?;
        let cells = route.cell_keys(population);

        debug!(
            from = %self.graph[from].name,
            to = %self.graph[to].name,
            fan = ?route.fan,
            cells = cells.len(),
            "wiring edge"
        );

        let predecessor = self.graph[from].name.clone();
        self.graph[to].predecessors.push(predecessor);
        self.graph.add_edge(from, to, Edge { route, cells });
        Ok(())
    }

    pub fn start(&self) -> NodeIndex {
        self.start
    }

    pub fn end(&self) -> NodeIndex {
        self.end
    }

    pub fn task(&self, node: NodeIndex) -> &Task {
        &self.graph[node]
    }

    pub fn node_of(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn task_by_name(&self, name: &str) -> Option<&Task> {
        self.node_of(name).map(|n| &self.graph[n])
    }

    /// Real steps (no Start / End), in step-table order.
    pub fn steps(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .node_indices()
            .filter(move |&n| n != self.start && n != self.end)
    }

    /// Every node including Start and End.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Every edge with its weight.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, &Edge)> + '_ {
        self.graph.edge_references().map(|e| (e.id(), e.weight()))
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edge_endpoints(&self, edge: EdgeIndex) -> Option<(&Task, &Task)> {
        self.graph
            .edge_endpoints(edge)
            .map(|(a, b)| (&self.graph[a], &self.graph[b]))
    }

    /// In-edges of `node`, sorted by predecessor name.
    pub fn incoming(&self, node: NodeIndex) -> Vec<Link<'_>> {
        self.links(node, Direction::Incoming)
    }

    /// Out-edges of `node`, sorted by successor name.
    pub fn outgoing(&self, node: NodeIndex) -> Vec<Link<'_>> {
        self.links(node, Direction::Outgoing)
    }

    fn links(&self, node: NodeIndex, direction: Direction) -> Vec<Link<'_>> {
        let mut links: Vec<Link<'_>> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| {
                let peer = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                Link {
                    edge: e.id(),
                    peer: &self.graph[peer],
                    weight: e.weight(),
                }
            })
            .collect();
        links.sort_by(|a, b| a.peer.name.cmp(&b.peer.name));
        links
    }

    /// Names of the direct successors of a task.
    pub fn successors_of(&self, name: &str) -> Vec<&str> {
        self.node_of(name)
            .map(|n| {
                self.outgoing(n)
                    .into_iter()
                    .map(|l| l.peer.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of the direct predecessors of a task.
    pub fn predecessors_of(&self, name: &str) -> Vec<&str> {
        self.node_of(name)
            .map(|n| {
                self.incoming(n)
                    .into_iter()
                    .map(|l| l.peer.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}
