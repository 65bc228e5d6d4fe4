//! Runtime: plan a `CubeQuery` into a step DAG, execute it, hand back the
//! root stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use cubedag_column::{MultitypeColumn, StepCache};
use cubedag_core::config::EngineConfig;
use cubedag_core::measure::MeasureGraph;
use cubedag_core::slice::Slice;
use cubedag_core::step::{CubeQuery, QueryOption};
use cubedag_core::value::Value;
use cubedag_operators::Registry;
use cubedag_planner::{explain, DagBuilder, PlanError, StepsDag};

use crate::metrics::ExecStats;
use crate::scheduler::{CancelFlag, StepExecutor};
use crate::source::DataSource;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("invalid query plan: {0}")]
    Plan(String),
    #[error("data source failed for step '{step}': {message}")]
    Source { step: String, message: String },
    #[error("recombination failed for step '{step}': {message}")]
    Recombination { step: String, message: String },
    #[error("execution cancelled")]
    Cancelled,
    #[error("task join: {0}")]
    Join(String),
    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl From<PlanError> for ExecError {
    fn from(e: PlanError) -> Self {
        ExecError::Plan(e.to_string())
    }
}

/// Root stores of one query, keyed by measure name. Carriers are finished.
#[derive(Debug, Clone)]
pub struct QueryResult {
    columns: BTreeMap<String, Arc<MultitypeColumn>>,
    stats: ExecStats,
    vertices: usize,
}

impl QueryResult {
    pub fn column(&self, measure: &str) -> Option<&MultitypeColumn> {
        self.columns.get(measure).map(Arc::as_ref)
    }

    /// Value of `measure` at `slice`; `None` when missing.
    pub fn value(&self, measure: &str, slice: &Slice) -> Option<Value> {
        self.column(measure)?.read(slice).to_value()
    }

    pub fn measures(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn stats(&self) -> ExecStats {
        self.stats
    }

    /// Vertices of the executed DAG.
    pub fn vertices(&self) -> usize {
        self.vertices
    }

    /// `{ measure: [ { "slice": {..}, "value": .. } ] }`, slices sorted.
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for (measure, column) in &self.columns {
            let rows = column
                .slices()
                .into_iter()
                .filter_map(|slice| {
                    let value = column.read(&slice).to_value()?;
                    Some(serde_json::json!({
                        "slice": slice,
                        "value": value_to_json(&value),
                    }))
                })
                .collect();
            out.insert(measure.clone(), serde_json::Value::Array(rows));
        }
        serde_json::Value::Object(out)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Long(l) => serde_json::Value::from(*l),
        Value::Double(d) => serde_json::Value::from(*d),
        Value::Text(s) => serde_json::Value::from(s.as_ref()),
        Value::Set(set) => serde_json::to_value(set.as_ref()).unwrap_or(serde_json::Value::Null),
        Value::Carrier(c) => c
            .finish()
            .map(|v| value_to_json(&v))
            .unwrap_or(serde_json::Value::Null),
    }
}

/// Owns the measure forest, the operator registry, the data source and the
/// optional step cache.
pub struct Engine {
    config: EngineConfig,
    forest: Arc<dyn MeasureGraph>,
    source: Arc<dyn DataSource>,
    registry: Arc<Registry>,
    cache: Option<Arc<dyn StepCache>>,
}

impl Engine {
    pub fn new(config: EngineConfig, forest: Arc<dyn MeasureGraph>, source: Arc<dyn DataSource>) -> Self {
        Self {
            config,
            forest,
            source,
            registry: Arc::new(Registry::new()),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn StepCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the step DAG of `query` without executing it.
    pub fn plan(&self, query: &CubeQuery) -> Result<StepsDag, ExecError> {
        let mut builder = DagBuilder::new(self.forest.as_ref(), &self.registry)
            .unknown_measures_are_empty(self.config.unknown_measures_are_empty);
        if let Some(cache) = &self.cache {
            builder = builder.with_cache(cache.as_ref());
        }
        Ok(builder.build(&query.steps())?)
    }

    /// The rendered step tree of `query`.
    pub fn explain(&self, query: &CubeQuery) -> Result<String, ExecError> {
        Ok(explain::render(&self.plan(query)?))
    }

    pub async fn execute(&self, query: &CubeQuery) -> Result<QueryResult, ExecError> {
        self.execute_with_cancel(query, CancelFlag::new()).await
    }

    /// Like `execute`; raising `cancel` stops vertices that have not started.
    pub async fn execute_with_cancel(
        &self,
        query: &CubeQuery,
        cancel: CancelFlag,
    ) -> Result<QueryResult, ExecError> {
        let dag = Arc::new(self.plan(query)?);
        if query.options.contains(&QueryOption::Explain) || query.debug {
            tracing::info!(tree = %explain::render(&dag), "query plan");
        }

        let mut executor = StepExecutor::new(self.config.clone(), Arc::clone(&self.source));
        if let Some(cache) = &self.cache {
            executor = executor.with_cache(Arc::clone(cache));
        }
        let results = executor.execute_with_cancel(Arc::clone(&dag), cancel).await?;

        let mut columns = BTreeMap::new();
        for step in query.steps() {
            let store = results.get(&step).ok_or_else(|| {
                ExecError::Invariant(format!("no store for root step '{step}'"))
            })?;
            let purged = store.as_ref().clone().purge_aggregation_carriers();
            columns.insert(step.measure.clone(), Arc::new(purged));
        }
        Ok(QueryResult {
            columns,
            stats: results.stats(),
            vertices: dag.len(),
        })
    }
}
