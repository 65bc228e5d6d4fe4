//! Debug-time checks for step DAGs.
//!
//! Intended for tests and debug builds; they panic with a message naming the
//! offending vertex.

use std::collections::HashSet;

use cubedag_core::id::StepId;

use crate::dag::StepsDag;

/// Every vertex of `order` comes after its underlyings, and `order` covers the
/// whole DAG exactly once.
pub fn assert_topological(dag: &StepsDag, order: &[StepId]) {
    assert_eq!(order.len(), dag.len(), "order does not cover every vertex");
    let mut seen = HashSet::<StepId>::new();
    for id in order {
        for u in dag.underlyings(*id) {
            assert!(seen.contains(u), "underlying {u} not before step {id}");
        }
        assert!(seen.insert(*id), "step {id} listed twice");
    }
}

/// A full topological order exists.
pub fn assert_acyclic(dag: &StepsDag) {
    let order = dag.topological_order();
    assert_eq!(
        order.len(),
        dag.len(),
        "{} vertices are on a cycle",
        dag.len() - order.len()
    );
}

/// No two vertices hold equal steps.
pub fn assert_interned(dag: &StepsDag) {
    let mut steps = HashSet::new();
    for v in dag.vertices() {
        assert!(steps.insert(&v.step), "step {} appears twice", v.step);
    }
}

/// Cached vertices were not expanded.
pub fn assert_cached_are_sinks(dag: &StepsDag) {
    for v in dag.vertices() {
        if v.is_cached() {
            assert!(v.underlyings.is_empty(), "cached step {} has underlyings", v.id);
        }
    }
}
