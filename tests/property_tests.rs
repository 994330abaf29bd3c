//! Property-based tests
//!
//! - Manifest tracking lists never shrink, whatever the operation sequence
//! - Catalog unions are sorted, unique and independent of request order

mod common;

use common::{RecordingObserver, Scratch, ScriptedInstaller, catalog, options};
use envkit::installer::{InstallEngine, TrackingPolicy};
use envkit::manifest::Manifest;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone)]
enum Op {
    Set(&'static str),
    Role(&'static str),
    Packages(Vec<String>),
    Link(&'static str),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::sample::select(vec!["jupyter", "data_science", "ml", "five", "ghost"])
            .prop_map(Op::Set),
        prop::sample::select(vec!["data_scientist", "ml_engineer", "broken", "nobody"])
            .prop_map(Op::Role),
        prop::collection::vec("[a-z]{1,6}", 0..4).prop_map(Op::Packages),
        prop::sample::select(vec!["/work/a", "/work/b"]).prop_map(Op::Link),
    ]
}

fn tracking_strategy() -> impl Strategy<Value = TrackingPolicy> {
    prop_oneof![Just(TrackingPolicy::Confirmed), Just(TrackingPolicy::Attempted)]
}

fn is_superset(after: &[String], before: &[String]) -> bool {
    let after: BTreeSet<&String> = after.iter().collect();
    before.iter().all(|item| after.contains(item))
}

fn grew_monotonically(before: &Manifest, after: &Manifest) -> bool {
    is_superset(&after.installed_sets, &before.installed_sets)
        && is_superset(&after.installed_roles, &before.installed_roles)
        && is_superset(&after.installed_packages, &before.installed_packages)
        && after.install_history.starts_with(&before.install_history)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// installed_sets, installed_roles and installed_packages only grow and
    /// the history is only appended to
    #[test]
    fn manifest_is_monotonic(
        ops in prop::collection::vec(op_strategy(), 1..8),
        tracking in tracking_strategy(),
        failing in prop::sample::select(vec!["pkg3", "numpy", "notebook", "none"]),
    ) {
        let scratch = Scratch::new();
        let catalog = catalog();
        let installer = ScriptedInstaller::new().always_failing(failing);
        let observer = RecordingObserver::default();
        let engine = InstallEngine::new(
            &catalog,
            &scratch.store,
            &installer,
            &observer,
            options(tracking),
        );

        let mut previous = scratch.manifest();
        for op in ops {
            match op {
                Op::Set(id) => {
                    let _ = engine.install_set(&scratch.runtime, &scratch.env, id);
                }
                Op::Role(id) => {
                    let _ = engine.install_role(&scratch.runtime, &scratch.env, id);
                }
                Op::Packages(packages) => {
                    scratch
                        .store
                        .record_packages(&scratch.env, &packages[..])
                        .expect("record packages");
                }
                Op::Link(path) => {
                    scratch
                        .store
                        .link_project(&scratch.env, Path::new(path))
                        .expect("link");
                }
            }
            let current = scratch.manifest();
            prop_assert!(grew_monotonically(&previous, &current));

            let mut sorted = current.installed_packages.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(&sorted, &current.installed_packages);
            previous = current;
        }
    }

    /// Union of sets is sorted, unique and does not depend on request order
    #[test]
    fn union_is_order_independent(
        ids in prop::collection::vec(
            prop::sample::select(vec!["jupyter", "data_science", "ml", "five", "seven", "ghost"]),
            0..6,
        )
    ) {
        let catalog = catalog();
        let forward = catalog.union_packages(&ids[..]);
        let mut reversed_ids = ids.clone();
        reversed_ids.reverse();
        let reversed = catalog.union_packages(&reversed_ids[..]);
        prop_assert_eq!(&forward, &reversed);

        let mut expected = forward.clone();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(&forward, &expected);

        let total: BTreeSet<String> = ids.iter().flat_map(|id| catalog.set_packages(id)).collect();
        prop_assert_eq!(forward.len(), total.len());
    }
}
