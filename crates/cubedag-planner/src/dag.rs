//! Step DAG: every distinct step reachable from the roots, interned by value.
//!
//! Vertices are numbered in post-order (a vertex after all of its
//! underlyings), and a vertex's underlyings keep the order its recombinator
//! expects.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use cubedag_column::{MultitypeColumn, StepCache};
use cubedag_core::error::Error;
use cubedag_core::hash::{hash_serde, Hash256};
use cubedag_core::id::StepId;
use cubedag_core::measure::MeasureGraph;
use cubedag_core::step::QueryStep;
use cubedag_operators::Registry;
use serde::Serialize;

use crate::error::Result;
use crate::expander::Expander;
use crate::recombinator::Recombinator;

/// How the executor obtains a vertex's store.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// Already known; underlyings were not expanded.
    Cached(Arc<MultitypeColumn>),
    Recombine(Recombinator),
}

#[derive(Debug, Clone)]
pub struct StepVertex {
    pub id: StepId,
    pub step: QueryStep,
    /// Measure kind name (`"cached"` for cached vertices).
    pub kind: &'static str,
    pub underlyings: Vec<StepId>,
    pub evaluation: Evaluation,
}

impl StepVertex {
    pub fn is_cached(&self) -> bool {
        matches!(self.evaluation, Evaluation::Cached(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(&self.evaluation, Evaluation::Recombine(r) if r.is_leaf())
    }
}

/// Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct StepsDag {
    vertices: Vec<StepVertex>,
    roots: Vec<StepId>,
    index: HashMap<QueryStep, StepId>,
}

impl StepsDag {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, id: StepId) -> &StepVertex {
        &self.vertices[id.index()]
    }

    pub fn vertices(&self) -> &[StepVertex] {
        &self.vertices
    }

    /// Root vertices in query order, without duplicates.
    pub fn roots(&self) -> &[StepId] {
        &self.roots
    }

    pub fn id_of(&self, step: &QueryStep) -> Option<StepId> {
        self.index.get(step).copied()
    }

    pub fn underlyings(&self, id: StepId) -> &[StepId] {
        &self.vertex(id).underlyings
    }

    /// Number of vertices depending on each vertex, indexed by id.
    pub fn parent_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.vertices.len()];
        for v in &self.vertices {
            for u in &v.underlyings {
                counts[u.index()] += 1;
            }
        }
        counts
    }

    /// Kahn's algorithm: every vertex after its underlyings, ties broken by
    /// id.
    pub fn topological_order(&self) -> Vec<StepId> {
        let mut pending: Vec<usize> = self.vertices.iter().map(|v| v.underlyings.len()).collect();
        let mut dependents: Vec<Vec<StepId>> = vec![Vec::new(); self.vertices.len()];
        for v in &self.vertices {
            for u in &v.underlyings {
                dependents[u.index()].push(v.id);
            }
        }

        let mut ready: VecDeque<StepId> = self
            .vertices
            .iter()
            .filter(|v| v.underlyings.is_empty())
            .map(|v| v.id)
            .collect();
        let mut order = Vec::with_capacity(self.vertices.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for d in &dependents[id.index()] {
                let p = &mut pending[d.index()];
                *p -= 1;
                if *p == 0 {
                    ready.push_back(*d);
                }
            }
        }
        order
    }

    /// Stable content hash over steps and edges.
    pub fn fingerprint(&self) -> cubedag_core::Result<Hash256> {
        #[derive(Serialize)]
        struct Entry<'a> {
            step: &'a QueryStep,
            underlyings: &'a [StepId],
            cached: bool,
        }
        let entries: Vec<Entry<'_>> = self
            .vertices
            .iter()
            .map(|v| Entry {
                step: &v.step,
                underlyings: &v.underlyings,
                cached: v.is_cached(),
            })
            .collect();
        hash_serde(&(entries, &self.roots))
    }
}

/// Expands root steps into a `StepsDag`.
pub struct DagBuilder<'a> {
    expander: Expander<'a>,
    cache: Option<&'a dyn StepCache>,
}

struct BuildState {
    dag: StepsDag,
    /// Measures on the current expansion path, outermost first.
    path: Vec<String>,
}

impl<'a> DagBuilder<'a> {
    pub fn new(graph: &'a dyn MeasureGraph, registry: &'a Registry) -> Self {
        Self {
            expander: Expander::new(graph, registry),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn StepCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn unknown_measures_are_empty(mut self, yes: bool) -> Self {
        self.expander = self.expander.unknown_measures_are_empty(yes);
        self
    }

    pub fn build(&self, roots: &[QueryStep]) -> Result<StepsDag> {
        let mut state = BuildState {
            dag: StepsDag::default(),
            path: Vec::new(),
        };
        for root in roots {
            let id = self.visit(root, &mut state)?;
            if !state.dag.roots.contains(&id) {
                state.dag.roots.push(id);
            }
        }

        let dag = state.dag;
        tracing::debug!(
            vertices = dag.len(),
            roots = dag.roots.len(),
            fingerprint = %dag.fingerprint().map(|h| h.short()).unwrap_or_default(),
            "step dag built"
        );
        Ok(dag)
    }

    fn visit(&self, step: &QueryStep, state: &mut BuildState) -> Result<StepId> {
        if let Some(id) = state.dag.id_of(step) {
            return Ok(id);
        }
        if state.path.iter().any(|m| *m == step.measure) {
            let mut path = state.path.clone();
            path.push(step.measure.clone());
            return Err(Error::CycleDetected { path }.into());
        }

        if let Some(column) = self.cache.and_then(|c| c.get(step)) {
            return Ok(push(state, step.clone(), "cached", Vec::new(), Evaluation::Cached(column)));
        }

        let expansion = self.expander.expand(step)?;
        state.path.push(step.measure.clone());
        let mut underlyings = Vec::with_capacity(expansion.underlyings.len());
        for u in &expansion.underlyings {
            underlyings.push(self.visit(u, state)?);
        }
        state.path.pop();

        Ok(push(
            state,
            step.clone(),
            expansion.kind,
            underlyings,
            Evaluation::Recombine(expansion.recombinator),
        ))
    }
}

fn push(
    state: &mut BuildState,
    step: QueryStep,
    kind: &'static str,
    underlyings: Vec<StepId>,
    evaluation: Evaluation,
) -> StepId {
    let id = StepId::new(state.dag.vertices.len() as u64);
    state.dag.index.insert(step.clone(), id);
    state.dag.vertices.push(StepVertex {
        id,
        step,
        kind,
        underlyings,
        evaluation,
    });
    id
}
