//! Step DAG executor.
//!
//! Every vertex is resolved through the claim table: the first task to touch
//! it computes it, concurrent and later touches await the same outcome. A
//! vertex spawns its underlyings as separate tasks, awaits them without
//! holding a permit, then takes a permit for its own leaf fetch or
//! recombination.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use cubedag_column::{MultitypeColumn, StepCache};
use cubedag_core::config::EngineConfig;
use cubedag_core::id::StepId;
use cubedag_core::step::QueryStep;
use cubedag_planner::{Evaluation, Recombinator, StepsDag};

use crate::claim::ClaimTable;
use crate::metrics::{self, ExecMetrics, ExecStats};
use crate::runtime::ExecError;
use crate::source::{DataSource, LeafRequest};

type StepOutcome = Result<Arc<MultitypeColumn>, ExecError>;

/// Cooperative cancellation. Once raised, vertices that have not started
/// resolve to `ExecError::Cancelled`; running ones finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stores of every vertex reached by an execution, keyed by step.
#[derive(Debug, Clone, Default)]
pub struct StepResults {
    stores: HashMap<QueryStep, Arc<MultitypeColumn>>,
    stats: ExecStats,
}

impl StepResults {
    pub fn get(&self, step: &QueryStep) -> Option<&Arc<MultitypeColumn>> {
        self.stores.get(step)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QueryStep, &Arc<MultitypeColumn>)> {
        self.stores.iter()
    }

    pub fn stats(&self) -> ExecStats {
        self.stats
    }
}

/// Runs step DAGs against one data source.
pub struct StepExecutor {
    source: Arc<dyn DataSource>,
    cache: Option<Arc<dyn StepCache>>,
    semaphore: Arc<Semaphore>,
    config: EngineConfig,
}

/// State shared by the tasks of one execution.
struct Run {
    dag: Arc<StepsDag>,
    claims: ClaimTable<StepId, StepOutcome>,
    source: Arc<dyn DataSource>,
    cache: Option<Arc<dyn StepCache>>,
    semaphore: Arc<Semaphore>,
    config: EngineConfig,
    cancel: CancelFlag,
    aborted: AtomicBool,
    first_error: Mutex<Option<ExecError>>,
    metrics: ExecMetrics,
}

impl StepExecutor {
    pub fn new(config: EngineConfig, source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            cache: None,
            semaphore: Arc::new(Semaphore::new(config.max_parallel_tasks.max(1))),
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn StepCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn execute(&self, dag: Arc<StepsDag>) -> Result<StepResults, ExecError> {
        self.execute_with_cancel(dag, CancelFlag::new()).await
    }

    /// Resolve every root (and thereby every reachable vertex). The result
    /// is complete, or the first error raised by a step.
    pub async fn execute_with_cancel(
        &self,
        dag: Arc<StepsDag>,
        cancel: CancelFlag,
    ) -> Result<StepResults, ExecError> {
        let run = Arc::new(Run {
            dag: Arc::clone(&dag),
            claims: ClaimTable::new(),
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
            semaphore: Arc::clone(&self.semaphore),
            config: self.config.clone(),
            cancel,
            aborted: AtomicBool::new(false),
            first_error: Mutex::new(None),
            metrics: ExecMetrics::default(),
        });

        let handles: Vec<_> = dag
            .roots()
            .iter()
            .map(|root| tokio::spawn(resolve(Arc::clone(&run), *root)))
            .collect();
        let mut failed = None;
        for joined in futures::future::join_all(handles).await {
            let outcome = joined.map_err(|e| ExecError::Join(e.to_string())).and_then(|o| o);
            if let Err(e) = outcome {
                failed.get_or_insert(e);
            }
        }

        if let Some(e) = failed {
            let first = run.take_first_error().unwrap_or(e);
            tracing::warn!(error = %first, "execution aborted");
            return Err(first);
        }

        let mut stores = HashMap::with_capacity(dag.len());
        for (id, outcome) in run.claims.completed() {
            stores.insert(dag.vertex(id).step.clone(), outcome?);
        }
        Ok(StepResults {
            stores,
            stats: run.metrics.snapshot(),
        })
    }
}

impl Run {
    fn record_error(&self, e: &ExecError) {
        self.metrics.record_failure();
        self.aborted.store(true, Ordering::SeqCst);
        let mut first = self.first_error.lock().unwrap_or_else(|p| p.into_inner());
        if first.is_none() && *e != ExecError::Cancelled {
            *first = Some(e.clone());
        }
    }

    fn take_first_error(&self) -> Option<ExecError> {
        self.first_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
    }

    fn stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.aborted.load(Ordering::SeqCst)
    }

    async fn permit(&self) -> Result<OwnedSemaphorePermit, ExecError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| ExecError::Invariant(format!("semaphore closed: {e}")))
    }
}

/// Claim-or-join on `id`. Boxed: resolution recurses through underlyings.
fn resolve(run: Arc<Run>, id: StepId) -> BoxFuture<'static, StepOutcome> {
    async move {
        let compute_run = Arc::clone(&run);
        run.claims
            .claim_or_join(&id, move || compute(compute_run, id))
            .await
    }
    .boxed()
}

async fn compute(run: Arc<Run>, id: StepId) -> StepOutcome {
    let outcome = evaluate(&run, id).await;
    if let Err(e) = &outcome {
        run.record_error(e);
    }
    outcome
}

async fn evaluate(run: &Arc<Run>, id: StepId) -> StepOutcome {
    if run.stopped() {
        return Err(ExecError::Cancelled);
    }
    let vertex = run.dag.vertex(id);
    let started = Instant::now();
    metrics::step_started(vertex);

    let recombinator = match &vertex.evaluation {
        Evaluation::Cached(store) => {
            run.metrics.record_cache_hit();
            return Ok(Arc::clone(store));
        }
        Evaluation::Recombine(r) => r,
    };

    let store = match recombinator {
        Recombinator::Leaf {
            column,
            aggregation,
        } => {
            let request = LeafRequest {
                step: vertex.step.clone(),
                column: column.clone(),
                aggregation: Arc::clone(aggregation),
                strategy: run.config.column_strategy,
            };
            let _permit = run.permit().await?;
            run.metrics.record_leaf_fetch();
            let fetched = run.source.aggregate(request).await.map_err(|e| ExecError::Source {
                step: vertex.step.to_string(),
                message: e.to_string(),
            })?;
            Arc::new(fetched)
        }
        other => {
            let handles: Vec<_> = vertex
                .underlyings
                .iter()
                .map(|u| tokio::spawn(resolve(Arc::clone(run), *u)))
                .collect();
            let mut stores = Vec::with_capacity(handles.len());
            for joined in futures::future::join_all(handles).await {
                stores.push(joined.map_err(|e| ExecError::Join(e.to_string()))??);
            }
            if run.stopped() {
                return Err(ExecError::Cancelled);
            }
            let _permit = run.permit().await?;
            run.metrics.record_recombination();
            other
                .recombine(&vertex.step, &stores, run.config.column_strategy)
                .map_err(|e| ExecError::Recombination {
                    step: vertex.step.to_string(),
                    message: e.to_string(),
                })?
        }
    };

    metrics::step_finished(vertex, store.len(), started.elapsed());
    if let Some(cache) = &run.cache {
        cache.put(vertex.step.clone(), cacheable(&store, run.config.purge_before_cache));
    }
    Ok(store)
}

fn cacheable(store: &Arc<MultitypeColumn>, purge: bool) -> Arc<MultitypeColumn> {
    if purge {
        Arc::new(store.as_ref().clone().purge_aggregation_carriers())
    } else {
        Arc::clone(store)
    }
}
