//! Step cache: finished stores keyed by step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cubedag_core::step::QueryStep;

use crate::column::MultitypeColumn;

/// Stores handed to `put` are immutable; `get` hands out the same `Arc`.
pub trait StepCache: Send + Sync {
    fn get(&self, step: &QueryStep) -> Option<Arc<MultitypeColumn>>;

    fn put(&self, step: QueryStep, column: Arc<MultitypeColumn>);
}

#[derive(Debug, Default)]
pub struct InMemoryStepCache {
    entries: Mutex<HashMap<QueryStep, Arc<MultitypeColumn>>>,
}

impl InMemoryStepCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.entries.lock() {
            e.clear();
        }
    }
}

impl StepCache for InMemoryStepCache {
    fn get(&self, step: &QueryStep) -> Option<Arc<MultitypeColumn>> {
        let entries = self.entries.lock().ok()?;
        entries.get(step).cloned()
    }

    fn put(&self, step: QueryStep, column: Arc<MultitypeColumn>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(step, column);
        }
    }
}
