// tests/graph_properties.rs

mod common;
use crate::common::{FakeBackend, SampleSheetBuilder, StepTableBuilder, build_graph, dispatch};

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use batchdag::config::StepTable;
use batchdag::dag::{END_TASK, START_TASK};
use batchdag::engine::Dispatcher;
use batchdag::entity::Population;

const TYPES: [&str; 3] = ["batch", "barcode", "sample"];

/// A random acyclic step table: step `i` may only list steps `0..i` as prior.
fn table_strategy(max_steps: usize) -> impl Strategy<Value = (StepTable, Vec<BTreeSet<usize>>)> {
    (1..=max_steps).prop_flat_map(|n| {
        (
            proptest::collection::vec(0..3usize, n),
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n),
        )
            .prop_map(move |(types, raw_priors)| {
                let mut builder = StepTableBuilder::new();
                let mut priors = Vec::new();
                for (i, potential) in raw_priors.into_iter().enumerate() {
                    let set: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|p| p % i).collect()
                    };
                    let prior: Vec<String> = set.iter().map(|p| format!("t{p}")).collect();
                    builder = builder.step(&format!("t{i}"), TYPES[types[i]], "", &prior.join(","));
                    priors.push(set);
                }
                (builder.build(), priors)
            })
    })
}

fn population() -> Population {
    SampleSheetBuilder::new()
        .sample("S1", "BC1")
        .sample("S2", "BC1")
        .sample("S3", "BC2")
        .population("/out")
}

proptest! {
    #[test]
    fn every_step_is_reachable_from_start_and_reaches_end(
        (table, priors) in table_strategy(8)
    ) {
        let pop = population();
        let graph = build_graph(&table, &pop).unwrap();

        let mut has_successor = vec![false; priors.len()];
        for set in priors.iter() {
            for &p in set {
                has_successor[p] = true;
            }
        }

        for (i, set) in priors.iter().enumerate() {
            let name = format!("t{i}");
            let preds = graph.predecessors_of(&name);
            prop_assert!(!preds.is_empty());
            if set.is_empty() {
                prop_assert_eq!(preds, vec![START_TASK]);
            }

            let succs = graph.successors_of(&name);
            if has_successor[i] {
                prop_assert!(!succs.contains(&END_TASK));
            } else {
                prop_assert_eq!(succs, vec![END_TASK]);
            }
        }

        let sinks = has_successor.iter().filter(|s| !**s).count();
        prop_assert_eq!(graph.predecessors_of(END_TASK).len(), sinks);
        prop_assert!(graph.task_by_name(END_TASK).unwrap().sink);
        prop_assert!(graph.steps().all(|n| !graph.task(n).sink));
    }

    #[test]
    fn wiring_claims_every_cell(
        (table, _priors) in table_strategy(8)
    ) {
        let pop = population();
        let graph = build_graph(&table, &pop).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(graph), Arc::new(pop), Arc::new(FakeBackend::new()));
        prop_assert!(dispatcher.wire().is_ok());
    }

    #[test]
    fn every_job_runs_exactly_once_after_its_predecessors(
        (table, _priors) in table_strategy(6)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let backend = Arc::new(FakeBackend::new());
        let expected: usize = table
            .steps
            .iter()
            .map(|s| match s.granularity.as_str() {
                "batch" => 1,
                "barcode" => 2,
                _ => 3,
            })
            .sum();

        let summary = rt.block_on(dispatch(&table, population(), Arc::clone(&backend))).unwrap();

        let executed = backend.executed();
        let unique: BTreeSet<&String> = executed.iter().collect();
        prop_assert_eq!(executed.len(), expected);
        prop_assert_eq!(unique.len(), expected);
        prop_assert_eq!(summary.jobs, expected);

        // Every id a job holds on was produced by an earlier call.
        for (pos, job) in backend.calls().iter().enumerate() {
            for id in job.hold.iter() {
                let at = executed.iter().position(|e| e == id);
                prop_assert!(matches!(at, Some(p) if p < pos), "{} held on {}", job.local_id(), id);
            }
        }
    }
}
