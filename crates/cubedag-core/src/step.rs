//! Query steps: the atomic evaluation unit interned by the planner.
//!
//! Equality and hashing cover the semantic fields only. The `debug` flag is a
//! logging hint and two steps differing only by it are the same step. No
//! scratch/memoization state lives here: the planner and executor keep their
//! own side tables keyed by step.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// Ordered set of group-by columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupBy(BTreeSet<String>);

impl GroupBy {
    pub fn grand_total() -> Self {
        Self::default()
    }

    pub fn of<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn is_grand_total(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + Clone {
        self.0.iter().map(String::as_str)
    }

    pub fn union<I, S>(&self, columns: I) -> GroupBy
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = self.0.clone();
        out.extend(columns.into_iter().map(Into::into));
        GroupBy(out)
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOption {
    /// Log the rendered step tree before executing.
    Explain,
    /// Resolve unknown measure references to an always-empty measure.
    UnknownMeasuresAreEmpty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStep {
    pub measure: String,
    pub filter: Filter,
    pub group_by: GroupBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_marker: Option<String>,
    #[serde(default)]
    pub options: BTreeSet<QueryOption>,
    #[serde(skip)]
    pub debug: bool,
}

impl QueryStep {
    pub fn new(measure: impl Into<String>) -> Self {
        Self {
            measure: measure.into(),
            filter: Filter::MatchAll,
            group_by: GroupBy::grand_total(),
            custom_marker: None,
            options: BTreeSet::new(),
            debug: false,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_option(mut self, option: QueryOption) -> Self {
        self.options.insert(option);
        self
    }

    pub fn has_option(&self, option: QueryOption) -> bool {
        self.options.contains(&option)
    }

    /// Same context (filter, group-by, marker, options), other measure.
    pub fn for_measure(&self, measure: &str) -> QueryStep {
        QueryStep {
            measure: measure.to_string(),
            filter: self.filter.clone(),
            group_by: self.group_by.clone(),
            custom_marker: self.custom_marker.clone(),
            options: self.options.clone(),
            debug: self.debug,
        }
    }
}

impl PartialEq for QueryStep {
    fn eq(&self, other: &Self) -> bool {
        self.measure == other.measure
            && self.filter == other.filter
            && self.group_by == other.group_by
            && self.custom_marker == other.custom_marker
            && self.options == other.options
    }
}

impl Eq for QueryStep {}

impl Hash for QueryStep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.measure.hash(state);
        self.filter.hash(state);
        self.group_by.hash(state);
        self.custom_marker.hash(state);
        self.options.hash(state);
    }
}

impl fmt::Display for QueryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} filter={} groupBy={}", self.measure, self.filter, self.group_by)?;
        if let Some(marker) = &self.custom_marker {
            write!(f, " marker={marker}")?;
        }
        Ok(())
    }
}

/// What a caller asks for: measures evaluated in one shared context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CubeQuery {
    pub measures: Vec<String>,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub custom_marker: Option<String>,
    #[serde(default)]
    pub options: BTreeSet<QueryOption>,
    #[serde(default)]
    pub debug: bool,
}

impl CubeQuery {
    pub fn measure(name: impl Into<String>) -> Self {
        Self {
            measures: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn and_measure(mut self, name: impl Into<String>) -> Self {
        self.measures.push(name.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = GroupBy::of(columns);
        self
    }

    pub fn option(mut self, option: QueryOption) -> Self {
        self.options.insert(option);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// One root step per requested measure, in request order.
    pub fn steps(&self) -> Vec<QueryStep> {
        self.measures
            .iter()
            .map(|m| QueryStep {
                measure: m.clone(),
                filter: self.filter.clone(),
                group_by: self.group_by.clone(),
                custom_marker: self.custom_marker.clone(),
                options: self.options.clone(),
                debug: self.debug,
            })
            .collect()
    }
}
