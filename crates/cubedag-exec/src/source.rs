//! Where leaf steps get their data.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use cubedag_column::MultitypeColumn;
use cubedag_core::config::ColumnStrategy;
use cubedag_core::slice::{Coordinate, Coordinates, Slice};
use cubedag_core::step::{GroupBy, QueryStep};
use cubedag_core::value::Value;
use cubedag_operators::{Aggregation, OpError};
use thiserror::Error;

/// Column name meaning "one per row".
pub const COUNT_ALL: &str = "*";

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

impl From<OpError> for SourceError {
    fn from(e: OpError) -> Self {
        SourceError(e.to_string())
    }
}

/// What a leaf step asks the source for: `column` aggregated with
/// `aggregation` per slice of `step.group_by`, over rows matching
/// `step.filter`.
#[derive(Debug, Clone)]
pub struct LeafRequest {
    pub step: QueryStep,
    pub column: String,
    pub aggregation: Arc<dyn Aggregation>,
    pub strategy: ColumnStrategy,
}

impl LeafRequest {
    /// An empty column bound to the request's aggregation.
    pub fn new_column(&self) -> MultitypeColumn {
        MultitypeColumn::new(Arc::clone(&self.aggregation), self.strategy)
    }
}

/// Fetches aggregated leaf data. Called at most once per distinct leaf step
/// and execution.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn aggregate(&self, request: LeafRequest) -> Result<MultitypeColumn, SourceError>;
}

/// One record of an `InMemoryTable`: dimension and measure columns alike.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(BTreeMap<String, Coordinate>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Coordinate>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Coordinate> {
        self.0.get(column)
    }

    /// The row's slice along `group_by`; `None` when a grouped column is
    /// missing from the row.
    pub fn slice(&self, group_by: &GroupBy) -> Option<Slice> {
        let mut pairs = Vec::with_capacity(group_by.len());
        for column in group_by.iter() {
            pairs.push((column, self.0.get(column)?.clone()));
        }
        Some(Slice::from_pairs(pairs))
    }
}

impl Coordinates for Row {
    fn coordinate(&self, column: &str) -> Option<&Coordinate> {
        self.0.get(column)
    }
}

/// Rows kept in memory, aggregated on request.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTable {
    rows: Vec<Row>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Synchronous body of `aggregate`.
    pub fn aggregate_rows(&self, request: &LeafRequest) -> Result<MultitypeColumn, SourceError> {
        let mut column = request.new_column();
        if request.step.filter.is_match_none() {
            return Ok(column);
        }
        for row in &self.rows {
            if !request.step.filter.matches(row) {
                continue;
            }
            let Some(slice) = row.slice(&request.step.group_by) else {
                continue;
            };
            let raw = if request.column == COUNT_ALL {
                Value::Long(1)
            } else {
                match row.get(&request.column) {
                    Some(c) => Value::from(c.clone()),
                    None => continue,
                }
            };
            column
                .merge(slice)
                .on_object(request.aggregation.lift_input(raw))?;
        }
        Ok(column)
    }
}

impl FromIterator<Row> for InMemoryTable {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl DataSource for InMemoryTable {
    async fn aggregate(&self, request: LeafRequest) -> Result<MultitypeColumn, SourceError> {
        self.aggregate_rows(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubedag_core::filter::Filter;
    use cubedag_core::measure::OperatorBinding;
    use cubedag_operators::Registry;

    fn request(column: &str, key: &str, step: QueryStep) -> LeafRequest {
        LeafRequest {
            step,
            column: column.to_string(),
            aggregation: Registry::new()
                .make_aggregation(&OperatorBinding::new(key))
                .unwrap(),
            strategy: ColumnStrategy::Hybrid,
        }
    }

    fn table() -> InMemoryTable {
        [
            Row::new().with("ccy", "EUR").with("country", "FR").with("k1", 10),
            Row::new().with("ccy", "EUR").with("country", "DE").with("k1", 5),
            Row::new().with("ccy", "USD").with("k1", 2),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn rows_missing_a_grouped_column_are_skipped() {
        let step = QueryStep::new("k1").with_group_by(GroupBy::of(["country"]));
        let col = table().aggregate_rows(&request("k1", "SUM", step)).unwrap();
        assert_eq!(col.len(), 2);
        let fr = Slice::from_pairs([("country", "FR")]);
        assert_eq!(col.read(&fr).to_value(), Some(Value::Long(10)));
    }

    #[test]
    fn star_counts_matching_rows() {
        let step = QueryStep::new("rows").with_filter(Filter::equals("ccy", "EUR"));
        let col = table().aggregate_rows(&request(COUNT_ALL, "SUM", step)).unwrap();
        assert_eq!(
            col.read(&Slice::grand_total()).to_value(),
            Some(Value::Long(2))
        );
    }
}
