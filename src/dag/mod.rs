// src/dag/mod.rs

//! Task graph construction and routing.
//!
//! - [`task`] turns a step row into a task with one rendered script per
//!   job-key.
//! - [`graph`] wires tasks into a DAG closed by synthetic Start and End.
//! - [`router`] decides which job-keys talk to which across an edge.
//! - [`channel`] materializes the synchronization cells of every edge.

pub mod channel;
pub mod graph;
pub mod router;
pub mod task;

pub use channel::ChannelTable;
pub use graph::{Edge, Link, TaskGraph};
pub use router::{Fan, Route, job_keys};
pub use task::{END_TASK, Paths, Resources, START_TASK, ScheduledJob, ScriptSpec, Task};
