//! Execution counters and tracing hooks.
//!
//! No telemetry stack here; the counters are plain atomics and events go
//! through `tracing`. Subscribers are the binary's business.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cubedag_planner::StepVertex;
use serde::Serialize;

/// Counters of one execution.
#[derive(Debug, Default)]
pub struct ExecMetrics {
    leaf_fetches: AtomicUsize,
    recombinations: AtomicUsize,
    cache_hits: AtomicUsize,
    failures: AtomicUsize,
}

/// Snapshot of `ExecMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecStats {
    pub leaf_fetches: usize,
    pub recombinations: usize,
    pub cache_hits: usize,
    pub failures: usize,
}

impl ExecMetrics {
    pub fn record_leaf_fetch(&self) {
        self.leaf_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recombination(&self) {
        self.recombinations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExecStats {
        ExecStats {
            leaf_fetches: self.leaf_fetches.load(Ordering::Relaxed),
            recombinations: self.recombinations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

pub fn step_started(vertex: &StepVertex) {
    tracing::trace!(id = %vertex.id, step = %vertex.step, kind = vertex.kind, "step started");
}

pub fn step_finished(vertex: &StepVertex, slices: usize, elapsed: Duration) {
    tracing::trace!(
        id = %vertex.id,
        step = %vertex.step,
        slices,
        elapsed_us = elapsed.as_micros() as u64,
        "step finished"
    );
}
