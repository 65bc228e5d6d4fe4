//! Hash slice store: one map per representation. A slice is in exactly one
//! of the three maps.

use std::collections::HashMap;

use cubedag_core::slice::Slice;
use cubedag_core::value::Value;
use cubedag_operators::Aggregation;

use crate::array::{merge_value, MultitypeArray};
use crate::value::{Incoming, ValueProvider};
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct HashStore {
    longs: HashMap<Slice, i64>,
    doubles: HashMap<Slice, f64>,
    objects: HashMap<Slice, Value>,
}

impl HashStore {
    pub fn len(&self) -> usize {
        self.longs.len() + self.doubles.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild from a navigable store's columns.
    pub(crate) fn from_parts(slices: Vec<Slice>, values: MultitypeArray) -> Self {
        let mut store = HashStore::default();
        match values {
            MultitypeArray::Empty => {}
            MultitypeArray::Longs(v) => store.longs = slices.into_iter().zip(v).collect(),
            MultitypeArray::Doubles(v) => store.doubles = slices.into_iter().zip(v).collect(),
            MultitypeArray::Objects(v) => store.objects = slices.into_iter().zip(v).collect(),
        }
        store
    }

    pub(crate) fn merge(&mut self, slice: Slice, incoming: Incoming, agg: &dyn Aggregation) -> Result<()> {
        // same primitive kind: stay unboxed
        match &incoming {
            Incoming::Long(l) => {
                if let Some(old) = self.longs.get_mut(&slice) {
                    *old = agg.aggregate_longs(*old, *l)?;
                    return Ok(());
                }
            }
            Incoming::Double(d) => {
                if let Some(old) = self.doubles.get_mut(&slice) {
                    *old = agg.aggregate_doubles(*old, *d)?;
                    return Ok(());
                }
            }
            Incoming::Object(_) => {}
        }

        if let Some(old) = self.objects.get_mut(&slice) {
            let right = agg.wrap(incoming.into_value())?;
            return merge_value(old, right, agg);
        }

        // the slice holds the other primitive kind: promote once the merge succeeded
        let promoted = match &incoming {
            Incoming::Long(_) => self.doubles.get(&slice).map(|d| Value::Double(*d)),
            Incoming::Double(_) => self.longs.get(&slice).map(|l| Value::Long(*l)),
            Incoming::Object(_) => self
                .longs
                .get(&slice)
                .map(|l| Value::Long(*l))
                .or_else(|| self.doubles.get(&slice).map(|d| Value::Double(*d))),
        };
        if let Some(left) = promoted {
            let right = agg.wrap(incoming.into_value())?;
            let merged = agg.aggregate(left, right)?;
            self.longs.remove(&slice);
            self.doubles.remove(&slice);
            self.objects.insert(slice, merged);
            return Ok(());
        }

        // new slice
        match incoming {
            Incoming::Long(l) if agg.native_longs() => {
                self.longs.insert(slice, l);
            }
            Incoming::Double(d) if agg.native_doubles() => {
                self.doubles.insert(slice, d);
            }
            other => {
                self.objects.insert(slice, agg.wrap(other.into_value())?);
            }
        }
        Ok(())
    }

    pub fn get(&self, slice: &Slice) -> ValueProvider<'_> {
        if let Some(l) = self.longs.get(slice) {
            ValueProvider::Long(*l)
        } else if let Some(d) = self.doubles.get(slice) {
            ValueProvider::Double(*d)
        } else if let Some(v) = self.objects.get(slice) {
            ValueProvider::Object(v)
        } else {
            ValueProvider::Missing
        }
    }

    /// Unordered iteration.
    pub fn iter(&self) -> impl Iterator<Item = (&Slice, ValueProvider<'_>)> + '_ {
        self.longs
            .iter()
            .map(|(s, l)| (s, ValueProvider::Long(*l)))
            .chain(self.doubles.iter().map(|(s, d)| (s, ValueProvider::Double(*d))))
            .chain(self.objects.iter().map(|(s, v)| (s, ValueProvider::Object(v))))
    }

    pub(crate) fn purge_carriers(mut self) -> Self {
        if !self.objects.values().any(|v| matches!(v, Value::Carrier(_))) {
            return self;
        }
        self.objects = self
            .objects
            .into_iter()
            .filter_map(|(s, v)| v.resolved().map(|v| (s, v)))
            .collect();
        self
    }

    pub fn shrink_to_fit(&mut self) {
        self.longs.shrink_to_fit();
        self.doubles.shrink_to_fit();
        self.objects.shrink_to_fit();
    }
}
