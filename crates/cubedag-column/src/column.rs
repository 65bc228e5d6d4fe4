//! `MultitypeColumn`: the store one step writes its slices into.

use std::fmt;
use std::sync::Arc;

use cubedag_core::config::ColumnStrategy;
use cubedag_core::slice::Slice;
use cubedag_operators::Aggregation;

use crate::hash::HashStore;
use crate::navigable::{NavigableStore, Slot};
use crate::value::{Incoming, ValueProvider, ValueReceiver};
use crate::Result;

#[derive(Debug, Clone)]
enum Layout {
    Navigable(NavigableStore),
    Hash(HashStore),
}

/// Slice → value map bound to one aggregation.
///
/// Values written twice to the same slice are merged with the aggregation.
/// A slice keeps primitive storage while it only sees one primitive kind.
#[derive(Clone)]
pub struct MultitypeColumn {
    aggregation: Arc<dyn Aggregation>,
    strategy: ColumnStrategy,
    layout: Layout,
}

impl MultitypeColumn {
    pub fn new(aggregation: Arc<dyn Aggregation>, strategy: ColumnStrategy) -> Self {
        let layout = match strategy {
            ColumnStrategy::Hash => Layout::Hash(HashStore::default()),
            ColumnStrategy::Navigable | ColumnStrategy::Hybrid => {
                Layout::Navigable(NavigableStore::default())
            }
        };
        Self {
            aggregation,
            strategy,
            layout,
        }
    }

    pub fn hash(aggregation: Arc<dyn Aggregation>) -> Self {
        Self::new(aggregation, ColumnStrategy::Hash)
    }

    pub fn navigable(aggregation: Arc<dyn Aggregation>) -> Self {
        Self::new(aggregation, ColumnStrategy::Navigable)
    }

    pub fn hybrid(aggregation: Arc<dyn Aggregation>) -> Self {
        Self::new(aggregation, ColumnStrategy::Hybrid)
    }

    /// An empty column; the store of always-empty steps.
    pub fn empty(aggregation: Arc<dyn Aggregation>) -> Self {
        Self::navigable(aggregation)
    }

    pub fn merge(&mut self, slice: Slice) -> ValueReceiver<'_> {
        ValueReceiver {
            column: self,
            slice,
        }
    }

    pub(crate) fn merge_incoming(&mut self, slice: Slice, incoming: Incoming) -> Result<()> {
        let agg = self.aggregation.as_ref();
        match &mut self.layout {
            Layout::Hash(store) => store.merge(slice, incoming, agg),
            Layout::Navigable(store) => {
                let slot = store.locate(&slice);
                if matches!(slot, Slot::OutOfOrder(_)) && self.strategy == ColumnStrategy::Hybrid {
                    let (slices, values) = std::mem::take(store).into_parts();
                    #[cfg(feature = "tracing")]
                    tracing::debug!(slices = slices.len(), "hybrid column switched to hash layout");
                    let mut hashed = HashStore::from_parts(slices, values);
                    let merged = hashed.merge(slice, incoming, agg);
                    self.layout = Layout::Hash(hashed);
                    return merged;
                }
                store.merge(slot, slice, incoming, agg)
            }
        }
    }

    pub fn read(&self, slice: &Slice) -> ValueProvider<'_> {
        match &self.layout {
            Layout::Navigable(store) => store.get(slice),
            Layout::Hash(store) => store.get(slice),
        }
    }

    pub fn contains(&self, slice: &Slice) -> bool {
        !self.read(slice).is_missing()
    }

    pub fn len(&self) -> usize {
        match &self.layout {
            Layout::Navigable(store) => store.len(),
            Layout::Hash(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the column is hash-indexed (always for `Hash`, after the
    /// first out-of-order write for `Hybrid`).
    pub fn is_hash(&self) -> bool {
        matches!(self.layout, Layout::Hash(_))
    }

    pub fn strategy(&self) -> ColumnStrategy {
        self.strategy
    }

    pub fn aggregation(&self) -> &Arc<dyn Aggregation> {
        &self.aggregation
    }

    /// Entries in storage order: sorted for navigable layouts, arbitrary for
    /// hash layouts.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (&Slice, ValueProvider<'_>)> + '_> {
        match &self.layout {
            Layout::Navigable(store) => Box::new(store.iter()),
            Layout::Hash(store) => Box::new(store.iter()),
        }
    }

    /// All slices, sorted.
    pub fn slices(&self) -> Vec<Slice> {
        self.sorted_slices().cloned().collect()
    }

    /// Borrowed slices in ascending order. Free for navigable layouts; hash
    /// layouts sort references.
    pub fn sorted_slices(&self) -> Box<dyn Iterator<Item = &Slice> + '_> {
        match &self.layout {
            Layout::Navigable(store) => Box::new(store.slices().iter()),
            Layout::Hash(store) => {
                let mut slices: Vec<&Slice> = store.iter().map(|(s, _)| s).collect();
                slices.sort_unstable();
                Box::new(slices.into_iter())
            }
        }
    }

    /// Equivalent column with every carrier replaced by its finished value.
    /// Slices whose carrier finishes to nothing are dropped.
    pub fn purge_aggregation_carriers(self) -> Self {
        let layout = match self.layout {
            Layout::Navigable(store) => Layout::Navigable(store.purge_carriers()),
            Layout::Hash(store) => Layout::Hash(store.purge_carriers()),
        };
        Self { layout, ..self }
    }

    /// Release spare capacity. Values are unchanged.
    pub fn compact(&mut self) {
        match &mut self.layout {
            Layout::Navigable(store) => store.shrink_to_fit(),
            Layout::Hash(store) => store.shrink_to_fit(),
        }
    }
}

impl fmt::Debug for MultitypeColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for slice in self.slices() {
            map.entry(&slice.to_string(), &self.read(&slice).to_value());
        }
        map.finish()
    }
}
