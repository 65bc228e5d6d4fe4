//! Measure definitions: the read-only graph the planner expands.
//!
//! Measures reference their underlyings *by name*; names are resolved lazily
//! through `MeasureGraph`, which tolerates forward declarations and keeps the
//! forest serializable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::Filter;

/// An operator key (e.g. "SUM", "RANK") plus its JSON options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BindingRepr")]
pub struct OperatorBinding {
    pub key: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

/// Accepts both `aggregation: SUM` and `aggregation: { key: RANK, config: {...} }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum BindingRepr {
    Key(String),
    Full {
        key: String,
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl From<BindingRepr> for OperatorBinding {
    fn from(r: BindingRepr) -> Self {
        match r {
            BindingRepr::Key(key) => OperatorBinding::new(key),
            BindingRepr::Full { key, config } => OperatorBinding { key, config },
        }
    }
}

impl OperatorBinding {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            config: serde_json::Value::Null,
        }
    }

    pub fn with_config(key: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            config,
        }
    }
}

impl From<&str> for OperatorBinding {
    fn from(key: &str) -> Self {
        OperatorBinding::new(key)
    }
}

fn sum_binding() -> OperatorBinding {
    OperatorBinding::new("SUM")
}

fn coalesce_binding() -> OperatorBinding {
    OperatorBinding::new("COALESCE")
}

/// One variant per measure kind. The planner matches on this exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasureKind {
    /// Reads `column` from the data source, aggregated with `aggregation`.
    Aggregator {
        column: String,
        #[serde(default = "sum_binding")]
        aggregation: OperatorBinding,
    },
    /// Combines its underlyings slice by slice.
    Combinator {
        underlyings: Vec<String>,
        #[serde(default = "sum_binding")]
        combination: OperatorBinding,
    },
    /// Evaluates underlyings on a finer group-by, combines each fine slice,
    /// then re-aggregates into the queried group-by.
    Bucketor {
        underlyings: Vec<String>,
        #[serde(default = "coalesce_binding")]
        combination: OperatorBinding,
        #[serde(default = "sum_binding")]
        aggregation: OperatorBinding,
        group_by: Vec<String>,
    },
    /// Adds `filter` to whatever the query filters on.
    Filtrator { underlying: String, filter: Filter },
    /// Removes the query's constraints on `columns` (all others when `inverse`).
    Unfiltrator {
        underlying: String,
        columns: Vec<String>,
        #[serde(default)]
        inverse: bool,
    },
    /// Empty unless every required column is grouped-by or mono-selected.
    Columnator {
        underlying: String,
        required_columns: Vec<String>,
    },
    /// Always empty.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(flatten)]
    pub kind: MeasureKind,
}

impl Measure {
    pub fn aggregator(
        name: impl Into<String>,
        column: impl Into<String>,
        aggregation: impl Into<OperatorBinding>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MeasureKind::Aggregator {
                column: column.into(),
                aggregation: aggregation.into(),
            },
        }
    }

    /// Aggregator summing the column of the same name.
    pub fn sum(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::aggregator(name.clone(), name, "SUM")
    }

    pub fn combinator<I, S>(
        name: impl Into<String>,
        underlyings: I,
        combination: impl Into<OperatorBinding>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: MeasureKind::Combinator {
                underlyings: underlyings.into_iter().map(Into::into).collect(),
                combination: combination.into(),
            },
        }
    }

    pub fn bucketor<I, S, G, T>(
        name: impl Into<String>,
        underlyings: I,
        combination: impl Into<OperatorBinding>,
        aggregation: impl Into<OperatorBinding>,
        group_by: G,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        G: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            kind: MeasureKind::Bucketor {
                underlyings: underlyings.into_iter().map(Into::into).collect(),
                combination: combination.into(),
                aggregation: aggregation.into(),
                group_by: group_by.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn filtrator(name: impl Into<String>, underlying: impl Into<String>, filter: Filter) -> Self {
        Self {
            name: name.into(),
            kind: MeasureKind::Filtrator {
                underlying: underlying.into(),
                filter,
            },
        }
    }

    pub fn unfiltrator<I, S>(
        name: impl Into<String>,
        underlying: impl Into<String>,
        columns: I,
        inverse: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: MeasureKind::Unfiltrator {
                underlying: underlying.into(),
                columns: columns.into_iter().map(Into::into).collect(),
                inverse,
            },
        }
    }

    pub fn columnator<I, S>(
        name: impl Into<String>,
        underlying: impl Into<String>,
        required_columns: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: MeasureKind::Columnator {
                underlying: underlying.into(),
                required_columns: required_columns.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MeasureKind::Empty,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            MeasureKind::Aggregator { .. } => "aggregator",
            MeasureKind::Combinator { .. } => "combinator",
            MeasureKind::Bucketor { .. } => "bucketor",
            MeasureKind::Filtrator { .. } => "filtrator",
            MeasureKind::Unfiltrator { .. } => "unfiltrator",
            MeasureKind::Columnator { .. } => "columnator",
            MeasureKind::Empty => "empty",
        }
    }

    /// Declared underlying measure names, in order.
    pub fn underlying_names(&self) -> Vec<&str> {
        match &self.kind {
            MeasureKind::Aggregator { .. } | MeasureKind::Empty => Vec::new(),
            MeasureKind::Combinator { underlyings, .. } | MeasureKind::Bucketor { underlyings, .. } => {
                underlyings.iter().map(String::as_str).collect()
            }
            MeasureKind::Filtrator { underlying, .. }
            | MeasureKind::Unfiltrator { underlying, .. }
            | MeasureKind::Columnator { underlying, .. } => vec![underlying.as_str()],
        }
    }
}

/// Read-only access to measure definitions.
pub trait MeasureGraph: Send + Sync {
    fn measure(&self, name: &str) -> Option<&Measure>;

    fn measure_by_name(&self, name: &str) -> Result<&Measure> {
        self.measure(name)
            .ok_or_else(|| Error::UnknownMeasure(name.to_string()))
    }
}

/// A named set of measures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ForestRepr", into = "ForestRepr")]
pub struct MeasureForest {
    name: String,
    measures: BTreeMap<String, Measure>,
}

#[derive(Serialize, Deserialize)]
struct ForestRepr {
    #[serde(default)]
    name: String,
    measures: Vec<Measure>,
}

impl TryFrom<ForestRepr> for MeasureForest {
    type Error = Error;

    fn try_from(repr: ForestRepr) -> Result<Self> {
        let mut forest = MeasureForest::new(repr.name);
        for m in repr.measures {
            if forest.measures.contains_key(&m.name) {
                return Err(Error::Config(format!(
                    "measure '{}' is defined twice in forest '{}'",
                    m.name, forest.name
                )));
            }
            forest.add(m);
        }
        Ok(forest)
    }
}

impl From<MeasureForest> for ForestRepr {
    fn from(f: MeasureForest) -> Self {
        ForestRepr {
            name: f.name,
            measures: f.measures.into_values().collect(),
        }
    }
}

impl MeasureForest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measures: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add (or replace) a measure.
    pub fn add(&mut self, measure: Measure) -> &mut Self {
        self.measures.insert(measure.name.clone(), measure);
        self
    }

    pub fn with(mut self, measure: Measure) -> Self {
        self.add(measure);
        self
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.values()
    }
}

impl FromIterator<Measure> for MeasureForest {
    fn from_iter<T: IntoIterator<Item = Measure>>(iter: T) -> Self {
        let mut forest = MeasureForest::new("");
        for m in iter {
            forest.add(m);
        }
        forest
    }
}

impl MeasureGraph for MeasureForest {
    fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.get(name)
    }
}
