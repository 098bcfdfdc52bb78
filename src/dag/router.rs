// src/dag/router.rs

//! Job-key routing between tasks of different granularities.
//!
//! Every edge carries one capacity-one cell per job-key of its *cell space*.
//! The cell space is keyed by the finer of the two granularities, which makes
//! every cell single-writer and single-reader:
//!
//! | producer → consumer | fan       | cells       | consumer `k` waits on | producer `k` signals |
//! |---------------------|-----------|-------------|-----------------------|----------------------|
//! | batch → batch       | Identity  | `batch`     | `k`                   | `k`                  |
//! | batch → barcode     | Broadcast | barcodes    | `k`                   | every barcode        |
//! | batch → sample      | Broadcast | samples     | `k`                   | every sample         |
//! | barcode → batch     | Collect   | barcodes    | every barcode         | `k`                  |
//! | barcode → barcode   | Identity  | barcodes    | `k`                   | `k`                  |
//! | barcode → sample    | Scatter   | samples     | `k`                   | members of `k`       |
//! | sample → batch      | Collect   | samples     | every sample          | `k`                  |
//! | sample → barcode    | Gather    | samples     | members of `k`        | `k`                  |
//! | sample → sample     | Identity  | samples     | `k`                   | `k`                  |

use crate::engine::JobKey;
use crate::entity::Population;
use crate::errors::{BatchdagError, Result};
use crate::types::{BATCH_KEY, Granularity};

/// How completion signals fan across one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fan {
    /// Same granularity on both sides; key `k` talks to key `k`.
    Identity,
    /// The single batch producer signals every consumer key.
    Broadcast,
    /// The single batch consumer waits on every producer key.
    Collect,
    /// A barcode producer signals each of its member samples.
    Scatter,
    /// A barcode consumer waits on each of its member samples.
    Gather,
}

/// Routing rule for one (producer, consumer) granularity pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub producer: Granularity,
    pub consumer: Granularity,
    pub fan: Fan,
}

const fn rule(producer: Granularity, consumer: Granularity, fan: Fan) -> Route {
    Route {
        producer,
        consumer,
        fan,
    }
}

/// The routing table. Lookups that miss it fail with `UnsupportedRouter`.
pub const ROUTES: [Route; 9] = [
    rule(Granularity::Batch, Granularity::Batch, Fan::Identity),
    rule(Granularity::Batch, Granularity::Barcode, Fan::Broadcast),
    rule(Granularity::Batch, Granularity::Sample, Fan::Broadcast),
    rule(Granularity::Barcode, Granularity::Batch, Fan::Collect),
    rule(Granularity::Barcode, Granularity::Barcode, Fan::Identity),
    rule(Granularity::Barcode, Granularity::Sample, Fan::Scatter),
    rule(Granularity::Sample, Granularity::Batch, Fan::Collect),
    rule(Granularity::Sample, Granularity::Barcode, Fan::Gather),
    rule(Granularity::Sample, Granularity::Sample, Fan::Identity),
];

/// Job-keys of every unit of the given granularity, sorted.
pub fn job_keys(granularity: Granularity, population: &Population) -> Vec<JobKey> {
    match granularity {
        Granularity::Batch => vec![BATCH_KEY.to_string()],
        Granularity::Barcode => population.barcode_ids(),
        Granularity::Sample => population.sample_ids(),
    }
}

impl Route {
    pub fn resolve(producer: Granularity, consumer: Granularity) -> Result<Route> {
        ROUTES
            .iter()
            .find(|r| r.producer == producer && r.consumer == consumer)
            .copied()
            .ok_or(BatchdagError::UnsupportedRouter { producer, consumer })
    }

    /// Every cell allocated on an edge that follows this route.
    pub fn cell_keys(&self, population: &Population) -> Vec<JobKey> {
        match self.fan {
            Fan::Identity | Fan::Broadcast => job_keys(self.consumer, population),
            Fan::Collect => job_keys(self.producer, population),
            Fan::Scatter | Fan::Gather => population.sample_ids(),
        }
    }

    /// Cells the consumer unit `job_key` must receive before it may run.
    pub fn wait_keys(&self, job_key: &str, population: &Population) -> Vec<JobKey> {
        match self.fan {
            Fan::Identity | Fan::Broadcast | Fan::Scatter => vec![job_key.to_string()],
            Fan::Collect => job_keys(self.producer, population),
            Fan::Gather => population.members_of(job_key).to_vec(),
        }
    }

    /// Cells the producer unit `job_key` fills once it has a result.
    pub fn signal_keys(&self, job_key: &str, population: &Population) -> Vec<JobKey> {
        match self.fan {
            Fan::Identity | Fan::Collect | Fan::Gather => vec![job_key.to_string()],
            Fan::Broadcast => job_keys(self.consumer, population),
            Fan::Scatter => population.members_of(job_key).to_vec(),
        }
    }
}
