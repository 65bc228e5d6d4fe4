//! Shared fixtures: measure forests, in-memory tables and instrumented
//! data sources.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cubedag_column::MultitypeColumn;
use cubedag_core::measure::{Measure, MeasureForest};
use cubedag_exec::{DataSource, InMemoryTable, LeafRequest, Row, SourceError};

/// Rows `{k1:123}`, `{k2:234}`, `{k1:345,k2:456}`.
pub fn k1_k2_table() -> InMemoryTable {
    [
        Row::new().with("k1", 123),
        Row::new().with("k2", 234),
        Row::new().with("k1", 345).with("k2", 456),
    ]
    .into_iter()
    .collect()
}

/// `k1`, `k2` and `total = k1 + k2`.
pub fn k1_k2_forest() -> MeasureForest {
    MeasureForest::new("scenario")
        .with(Measure::sum("k1"))
        .with(Measure::sum("k2"))
        .with(Measure::combinator("total", ["k1", "k2"], "SUM"))
}

const COUNTRIES: &[(&str, &str)] = &[
    ("FR", "Europe"),
    ("DE", "Europe"),
    ("IT", "Europe"),
    ("US", "America"),
    ("CA", "America"),
    ("BR", "America"),
    ("JP", "Asia"),
    ("IN", "Asia"),
];

/// Deterministic sales rows: country, continent, currency and amount.
pub fn sales_table(rows: usize) -> InMemoryTable {
    (0..rows)
        .map(|i| {
            let (country, continent) = COUNTRIES[i % COUNTRIES.len()];
            let ccy = if continent == "Europe" { "EUR" } else { "USD" };
            Row::new()
                .with("country", country)
                .with("continent", continent)
                .with("ccy", ccy)
                .with("amount", ((i * 37) % 101) as i64)
        })
        .collect()
}

/// Wraps a source and counts leaf fetches per step.
pub struct CountingSource<S> {
    inner: S,
    delay: Option<Duration>,
    calls: AtomicUsize,
    per_step: Mutex<HashMap<String, usize>>,
}

impl<S: DataSource> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            delay: None,
            calls: AtomicUsize::new(0),
            per_step: Mutex::new(HashMap::new()),
        }
    }

    /// Sleep before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, step: &str) -> usize {
        self.per_step
            .lock()
            .unwrap()
            .get(step)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl<S: DataSource> DataSource for CountingSource<S> {
    async fn aggregate(&self, request: LeafRequest) -> Result<MultitypeColumn, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_step
            .lock()
            .unwrap()
            .entry(request.step.to_string())
            .or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.aggregate(request).await
    }
}

/// Fails every leaf reading `column`.
pub struct FailingSource<S> {
    inner: S,
    column: String,
}

impl<S: DataSource> FailingSource<S> {
    pub fn new(inner: S, column: impl Into<String>) -> Self {
        Self {
            inner,
            column: column.into(),
        }
    }
}

#[async_trait]
impl<S: DataSource> DataSource for FailingSource<S> {
    async fn aggregate(&self, request: LeafRequest) -> Result<MultitypeColumn, SourceError> {
        if request.column == self.column {
            return Err(SourceError(format!("column '{}' is unavailable", self.column)));
        }
        self.inner.aggregate(request).await
    }
}

/// Lets tests keep a handle on an instrumented source after handing it to
/// an engine.
pub fn shared<S: DataSource + 'static>(source: S) -> (Arc<S>, Arc<dyn DataSource>) {
    let source = Arc::new(source);
    let dyn_source: Arc<dyn DataSource> = source.clone();
    (source, dyn_source)
}
