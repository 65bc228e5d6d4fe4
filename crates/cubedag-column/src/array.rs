//! `MultitypeArray`: a dense value array that stays primitive while every
//! entry has the same primitive kind.
//!
//! The array holds longs only, doubles only, or objects. The first accepted
//! entry of another kind turns the whole array into objects; it never goes
//! back. Every other entry is then boxed as `Value::Long` / `Value::Double`,
//! which costs memory but no precision: readers still get them through
//! `on_long` / `on_double`. Columns that expect mixed kinds on a few slices
//! should use the hash or hybrid layout, which promote one slice at a time.

use std::mem;

use cubedag_core::value::Value;
use cubedag_operators::{Aggregation, OpError};

use crate::value::{Incoming, ValueProvider};
use crate::Result;

#[derive(Debug, Clone, Default)]
pub enum MultitypeArray {
    #[default]
    Empty,
    Longs(Vec<i64>),
    Doubles(Vec<f64>),
    Objects(Vec<Value>),
}

impl MultitypeArray {
    pub fn len(&self) -> usize {
        match self {
            MultitypeArray::Empty => 0,
            MultitypeArray::Longs(v) => v.len(),
            MultitypeArray::Doubles(v) => v.len(),
            MultitypeArray::Objects(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_objects(&self) -> bool {
        matches!(self, MultitypeArray::Objects(_))
    }

    pub fn get(&self, index: usize) -> ValueProvider<'_> {
        let found = match self {
            MultitypeArray::Empty => None,
            MultitypeArray::Longs(v) => v.get(index).map(|l| ValueProvider::Long(*l)),
            MultitypeArray::Doubles(v) => v.get(index).map(|d| ValueProvider::Double(*d)),
            MultitypeArray::Objects(v) => v.get(index).map(ValueProvider::Object),
        };
        found.unwrap_or(ValueProvider::Missing)
    }

    /// Insert a new entry at `index` (`index == len` appends).
    pub(crate) fn insert(&mut self, index: usize, incoming: Incoming, agg: &dyn Aggregation) -> Result<()> {
        if matches!(self, MultitypeArray::Empty) {
            match incoming {
                Incoming::Long(_) if agg.native_longs() => *self = MultitypeArray::Longs(Vec::new()),
                Incoming::Double(_) if agg.native_doubles() => {
                    *self = MultitypeArray::Doubles(Vec::new())
                }
                _ => {}
            }
        }
        match (&mut *self, &incoming) {
            (MultitypeArray::Longs(v), Incoming::Long(l)) => {
                v.insert(index, *l);
                return Ok(());
            }
            (MultitypeArray::Doubles(v), Incoming::Double(d)) => {
                v.insert(index, *d);
                return Ok(());
            }
            _ => {}
        }
        let value = agg.wrap(incoming.into_value())?;
        self.objects_mut().insert(index, value);
        Ok(())
    }

    /// Merge into the existing entry at `index`. A rejected merge leaves the
    /// array as it was.
    pub(crate) fn merge(&mut self, index: usize, incoming: Incoming, agg: &dyn Aggregation) -> Result<()> {
        match (&mut *self, &incoming) {
            (MultitypeArray::Longs(v), Incoming::Long(l)) => {
                v[index] = agg.aggregate_longs(v[index], *l)?;
                return Ok(());
            }
            (MultitypeArray::Doubles(v), Incoming::Double(d)) => {
                v[index] = agg.aggregate_doubles(v[index], *d)?;
                return Ok(());
            }
            _ => {}
        }
        let right = agg.wrap(incoming.into_value())?;
        if let MultitypeArray::Objects(v) = self {
            return merge_value(&mut v[index], right, agg);
        }
        // different kind than the array holds: promote once the merge succeeded
        let left = self
            .get(index)
            .to_raw_value()
            .ok_or_else(|| OpError::Invariant(format!("no entry at index {index}")))?;
        let merged = agg.aggregate(left, right)?;
        self.objects_mut()[index] = merged;
        Ok(())
    }

    /// Switch to the object representation (no-op when already there).
    fn objects_mut(&mut self) -> &mut Vec<Value> {
        if !self.is_objects() {
            let objects = match mem::take(self) {
                MultitypeArray::Empty => Vec::new(),
                MultitypeArray::Longs(v) => v.into_iter().map(Value::Long).collect(),
                MultitypeArray::Doubles(v) => v.into_iter().map(Value::Double).collect(),
                MultitypeArray::Objects(v) => v,
            };
            *self = MultitypeArray::Objects(objects);
        }
        match self {
            MultitypeArray::Objects(v) => v,
            _ => unreachable!("converted to objects above"),
        }
    }

    pub fn shrink_to_fit(&mut self) {
        match self {
            MultitypeArray::Empty => {}
            MultitypeArray::Longs(v) => v.shrink_to_fit(),
            MultitypeArray::Doubles(v) => v.shrink_to_fit(),
            MultitypeArray::Objects(v) => v.shrink_to_fit(),
        }
    }
}

/// Merge `right` into `slot`. On error `slot` keeps its old value. Carriers of
/// the same type are moved out so the aggregation can merge them in place.
pub(crate) fn merge_value(slot: &mut Value, right: Value, agg: &dyn Aggregation) -> Result<()> {
    let same_carrier = matches!(
        (&*slot, &right),
        (Value::Carrier(l), Value::Carrier(r)) if l.as_any().type_id() == r.as_any().type_id()
    );
    let left = if same_carrier {
        mem::replace(slot, Value::Long(0))
    } else {
        slot.clone()
    };
    *slot = agg.aggregate(left, right)?;
    Ok(())
}
