//! Sorted slice store: slices in ascending order, values in a parallel
//! `MultitypeArray`.
//!
//! Appending a slice greater than the last one is O(1) and merging into a
//! known slice is a binary search. Anything else is an insertion.

use cubedag_core::slice::Slice;
use cubedag_core::value::Value;
use cubedag_operators::Aggregation;

use crate::array::MultitypeArray;
use crate::value::{Incoming, ValueProvider};
use crate::Result;

/// Where a slice goes in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Existing(usize),
    Append,
    /// New slice sorting before the last one.
    OutOfOrder(usize),
}

#[derive(Debug, Clone, Default)]
pub struct NavigableStore {
    slices: Vec<Slice>,
    values: MultitypeArray,
}

impl NavigableStore {
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn locate(&self, slice: &Slice) -> Slot {
        match self.slices.last() {
            None => Slot::Append,
            Some(last) if last < slice => Slot::Append,
            Some(_) => match self.slices.binary_search(slice) {
                Ok(i) => Slot::Existing(i),
                Err(i) => Slot::OutOfOrder(i),
            },
        }
    }

    pub(crate) fn merge(
        &mut self,
        slot: Slot,
        slice: Slice,
        incoming: Incoming,
        agg: &dyn Aggregation,
    ) -> Result<()> {
        match slot {
            Slot::Existing(i) => self.values.merge(i, incoming, agg),
            Slot::Append => {
                self.values.insert(self.slices.len(), incoming, agg)?;
                self.slices.push(slice);
                Ok(())
            }
            Slot::OutOfOrder(i) => {
                self.values.insert(i, incoming, agg)?;
                self.slices.insert(i, slice);
                Ok(())
            }
        }
    }

    pub fn get(&self, slice: &Slice) -> ValueProvider<'_> {
        match self.slices.binary_search(slice) {
            Ok(i) => self.values.get(i),
            Err(_) => ValueProvider::Missing,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slice, ValueProvider<'_>)> + '_ {
        self.slices
            .iter()
            .enumerate()
            .map(move |(i, s)| (s, self.values.get(i)))
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn values(&self) -> &MultitypeArray {
        &self.values
    }

    pub(crate) fn into_parts(self) -> (Vec<Slice>, MultitypeArray) {
        (self.slices, self.values)
    }

    /// Finish carriers; slices whose carrier has no value are dropped.
    pub(crate) fn purge_carriers(self) -> Self {
        let MultitypeArray::Objects(objects) = &self.values else {
            return self;
        };
        if !objects.iter().any(|v| matches!(v, Value::Carrier(_))) {
            return self;
        }

        let (slices, values) = self.into_parts();
        let MultitypeArray::Objects(objects) = values else {
            unreachable!("checked above");
        };
        let mut kept_slices = Vec::with_capacity(slices.len());
        let mut kept_values = Vec::with_capacity(objects.len());
        for (slice, value) in slices.into_iter().zip(objects) {
            if let Some(v) = value.resolved() {
                kept_slices.push(slice);
                kept_values.push(v);
            }
        }
        Self {
            slices: kept_slices,
            values: MultitypeArray::Objects(kept_values),
        }
    }

    pub fn shrink_to_fit(&mut self) {
        self.slices.shrink_to_fit();
        self.values.shrink_to_fit();
    }
}
