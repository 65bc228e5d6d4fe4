//! Engine configuration that downstream crates can serialize/deserialize.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How a multitype column indexes its slices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStrategy {
    /// Sorted slices; out-of-order writes pay an insertion.
    Navigable,
    /// Hash-indexed slices.
    Hash,
    /// Sorted until the first out-of-order slice, then hash for good.
    #[default]
    Hybrid,
}

impl FromStr for ColumnStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigable" | "sorted" => Ok(ColumnStrategy::Navigable),
            "hash" => Ok(ColumnStrategy::Hash),
            "hybrid" => Ok(ColumnStrategy::Hybrid),
            other => Err(Error::Config(format!("unknown column strategy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on leaf fetches and recombinations running at once.
    pub max_parallel_tasks: usize,

    /// Index layout of the columns created by the engine.
    pub column_strategy: ColumnStrategy,

    /// Resolve unknown measures to an always-empty measure instead of failing.
    pub unknown_measures_are_empty: bool,

    /// Finish aggregation carriers before a store is handed to the step cache.
    pub purge_before_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            column_strategy: ColumnStrategy::Hybrid,
            unknown_measures_are_empty: false,
            purge_before_cache: true,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `CUBEDAG_MAX_PARALLEL_TASKS`: max leaf/recombination tasks at once
    /// - `CUBEDAG_COLUMN_STRATEGY`: `navigable`, `hash` or `hybrid`
    /// - `CUBEDAG_UNKNOWN_MEASURES_ARE_EMPTY`: `true`/`false`
    /// - `CUBEDAG_PURGE_BEFORE_CACHE`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("CUBEDAG_MAX_PARALLEL_TASKS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_tasks = v.max(1);
            }
        }

        if let Ok(s) = std::env::var("CUBEDAG_COLUMN_STRATEGY") {
            if let Ok(v) = s.parse::<ColumnStrategy>() {
                cfg.column_strategy = v;
            }
        }

        if let Ok(s) = std::env::var("CUBEDAG_UNKNOWN_MEASURES_ARE_EMPTY") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.unknown_measures_are_empty = v;
            }
        }

        if let Ok(s) = std::env::var("CUBEDAG_PURGE_BEFORE_CACHE") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.purge_before_cache = v;
            }
        }

        cfg
    }

    pub fn with_max_parallel_tasks(mut self, n: usize) -> Self {
        self.max_parallel_tasks = n.max(1);
        self
    }

    pub fn with_column_strategy(mut self, strategy: ColumnStrategy) -> Self {
        self.column_strategy = strategy;
        self
    }
}
