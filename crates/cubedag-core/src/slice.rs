//! Slices: coordinate tuples along the grouped dimensions.
//!
//! A `Slice` is immutable and shares its entries behind an `Arc`, so handing a
//! slice from one step's column to another is a pointer copy. Entries are kept
//! sorted by column name: two slices built in a different column order are the
//! same slice.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A single, never-null dimension value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Bool(bool),
    Long(i64),
    Double(f64),
    Text(Arc<str>),
}

impl Coordinate {
    pub fn text(s: impl AsRef<str>) -> Self {
        Coordinate::Text(Arc::from(s.as_ref()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Coordinate::Text(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Coordinate::Bool(_) => 0,
            Coordinate::Long(_) => 1,
            Coordinate::Double(_) => 2,
            Coordinate::Text(_) => 3,
        }
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coordinate {}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        use Coordinate::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Coordinate::Bool(b) => b.hash(state),
            Coordinate::Long(l) => l.hash(state),
            // consistent with total_cmp: equal iff same bits
            Coordinate::Double(d) => d.to_bits().hash(state),
            Coordinate::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Bool(b) => write!(f, "{b}"),
            Coordinate::Long(l) => write!(f, "{l}"),
            Coordinate::Double(d) => write!(f, "{d}"),
            Coordinate::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Coordinate {
    fn from(v: i64) -> Self {
        Coordinate::Long(v)
    }
}

impl From<i32> for Coordinate {
    fn from(v: i32) -> Self {
        Coordinate::Long(i64::from(v))
    }
}

impl From<f64> for Coordinate {
    fn from(v: f64) -> Self {
        Coordinate::Double(v)
    }
}

impl From<bool> for Coordinate {
    fn from(v: bool) -> Self {
        Coordinate::Bool(v)
    }
}

impl From<&str> for Coordinate {
    fn from(v: &str) -> Self {
        Coordinate::text(v)
    }
}

impl From<String> for Coordinate {
    fn from(v: String) -> Self {
        Coordinate::Text(Arc::from(v))
    }
}

/// Anything that can answer "which coordinate does this column have": slices,
/// and the rows of in-memory tables.
pub trait Coordinates {
    fn coordinate(&self, column: &str) -> Option<&Coordinate>;
}

impl Coordinates for BTreeMap<String, Coordinate> {
    fn coordinate(&self, column: &str) -> Option<&Coordinate> {
        self.get(column)
    }
}

/// Immutable column -> coordinate mapping.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slice {
    entries: Arc<[(Arc<str>, Coordinate)]>,
}

impl Slice {
    /// The slice of a query without group-by.
    pub fn grand_total() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }

    /// Build a slice from `(column, coordinate)` pairs in any order. A column
    /// given twice keeps its last coordinate.
    pub fn from_pairs<I, C, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<str>,
        V: Into<Coordinate>,
    {
        let sorted: BTreeMap<Arc<str>, Coordinate> = pairs
            .into_iter()
            .map(|(c, v)| (Arc::from(c.as_ref()), v.into()))
            .collect();
        Self {
            entries: sorted.into_iter().collect::<Vec<_>>().into(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Coordinate> {
        self.entries
            .binary_search_by(|(c, _)| c.as_ref().cmp(column))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Coordinate)> {
        self.entries.iter().map(|(c, v)| (c.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the columns of `group_by`. Returns `self` (shared) when
    /// nothing is dropped.
    pub fn coarsen<'a, I>(&self, group_by: I) -> Slice
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let keep = |column: &str| group_by.clone().into_iter().any(|g| g == column);
        if self.entries.iter().all(|(c, _)| keep(c)) {
            return self.clone();
        }
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(c, _)| keep(c))
                .cloned()
                .collect::<Vec<_>>()
                .into(),
        }
    }

    /// True when both slices share the same allocation.
    pub fn ptr_eq(&self, other: &Slice) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl Coordinates for Slice {
    fn coordinate(&self, column: &str) -> Option<&Coordinate> {
        self.get(column)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(c, v)| (c.as_ref(), v)))
            .finish()
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, (c, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}={v}")?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Slice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (c, v) in self.entries.iter() {
            map.serialize_entry(c.as_ref(), v)?;
        }
        map.end()
    }
}
