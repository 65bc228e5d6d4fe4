//! Operator registry: key -> factory, for aggregations and combinations.
//!
//! Keys are case-insensitive ("sum" and "SUM" are the same operator). Custom
//! operators are registered next to the built-ins and override them on key
//! collision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use cubedag_core::measure::OperatorBinding;

use crate::aggregation::{
    CountAggregation, CountDistinctAggregation, ExclusiveAggregation, ExtremumAggregation,
    RankAggregation, SumAggregation, UnionAggregation,
};
use crate::combination::{
    CoalesceCombination, ConstantCombination, DivideCombination, ExtremumCombination,
    ProductCombination, SubtractCombination, SumCombination,
};
use crate::traits::{Aggregation, Combination, OpError};

pub type AggregationFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Aggregation>, OpError> + Send + Sync>;
pub type CombinationFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Combination>, OpError> + Send + Sync>;

static EXCLUSIVE: Lazy<Arc<dyn Aggregation>> = Lazy::new(|| Arc::new(ExclusiveAggregation));

/// Aggregation of stores written once per slice (combinator outputs).
pub fn exclusive() -> Arc<dyn Aggregation> {
    Arc::clone(&EXCLUSIVE)
}

#[derive(Clone)]
pub struct Registry {
    aggregations: HashMap<String, AggregationFactory>,
    combinations: HashMap<String, CombinationFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aggs: Vec<_> = self.aggregations.keys().collect();
        let mut combs: Vec<_> = self.combinations.keys().collect();
        aggs.sort();
        combs.sort();
        f.debug_struct("Registry")
            .field("aggregations", &aggs)
            .field("combinations", &combs)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with every built-in operator.
    pub fn new() -> Self {
        let mut r = Self::empty();

        r.register_aggregation("SUM", |cfg| Ok(Arc::new(SumAggregation::from_config(cfg)?)));
        r.register_aggregation("COUNT", |_| Ok(Arc::new(CountAggregation)));
        r.register_aggregation("MIN", |_| Ok(Arc::new(ExtremumAggregation::min())));
        r.register_aggregation("MAX", |_| Ok(Arc::new(ExtremumAggregation::max())));
        r.register_aggregation("RANK", |cfg| Ok(Arc::new(RankAggregation::from_config(cfg)?)));
        r.register_aggregation("UNION", |_| Ok(Arc::new(UnionAggregation)));
        r.register_aggregation("COUNT_DISTINCT", |_| Ok(Arc::new(CountDistinctAggregation)));
        r.register_aggregation(ExclusiveAggregation::KEY, |_| Ok(exclusive()));

        r.register_combination("SUM", |_| Ok(Arc::new(SumCombination)));
        r.register_combination("SUBTRACT", |_| Ok(Arc::new(SubtractCombination)));
        r.register_combination("PRODUCT", |_| Ok(Arc::new(ProductCombination)));
        r.register_combination("DIVIDE", |_| Ok(Arc::new(DivideCombination)));
        r.register_combination("MIN", |_| Ok(Arc::new(ExtremumCombination::min())));
        r.register_combination("MAX", |_| Ok(Arc::new(ExtremumCombination::max())));
        r.register_combination("COALESCE", |_| Ok(Arc::new(CoalesceCombination)));
        r.register_combination(ConstantCombination::KEY, |cfg| {
            Ok(Arc::new(ConstantCombination::from_config(cfg)?))
        });

        r
    }

    /// Registry without any operator.
    pub fn empty() -> Self {
        Self {
            aggregations: HashMap::new(),
            combinations: HashMap::new(),
        }
    }

    pub fn register_aggregation<F>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Aggregation>, OpError> + Send + Sync + 'static,
    {
        self.aggregations.insert(normalize(key), Arc::new(factory));
        self
    }

    pub fn register_combination<F>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Combination>, OpError> + Send + Sync + 'static,
    {
        self.combinations.insert(normalize(key), Arc::new(factory));
        self
    }

    /// Register a ready-made combination under its own key, ignoring config.
    pub fn register_combination_instance(&mut self, combination: Arc<dyn Combination>) -> &mut Self {
        let key = combination.key().to_string();
        self.register_combination(&key, move |_| Ok(Arc::clone(&combination)))
    }

    pub fn make_aggregation(&self, binding: &OperatorBinding) -> Result<Arc<dyn Aggregation>, OpError> {
        let factory = self
            .aggregations
            .get(&normalize(&binding.key))
            .ok_or_else(|| OpError::UnknownOperator(binding.key.clone()))?;
        factory(&binding.config)
    }

    pub fn make_combination(&self, binding: &OperatorBinding) -> Result<Arc<dyn Combination>, OpError> {
        let factory = self
            .combinations
            .get(&normalize(&binding.key))
            .ok_or_else(|| OpError::UnknownOperator(binding.key.clone()))?;
        factory(&binding.config)
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}
