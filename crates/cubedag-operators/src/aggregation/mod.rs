//! Built-in aggregations.
//!
//! `SUM`, `COUNT`, `MIN`, `MAX` keep raw longs/doubles in primitive storage.
//! `RANK`, `UNION` and `COUNT_DISTINCT` accumulate in richer values (sets,
//! carriers) and never take the primitive paths.

pub mod distinct;
pub mod rank;

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Deserialize;

use cubedag_core::value::{AggregationCarrier, Value};

use crate::traits::{Aggregation, OpError};

pub use distinct::{CountDistinctAggregation, DistinctCarrier, UnionAggregation};
pub use rank::{RankAggregation, RankCarrier};

/// What `SUM` does when text meets a number or another text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextPolicy {
    /// Concatenate the textual forms, in merge order.
    #[default]
    Concatenate,
    /// Reject text with a type error.
    Reject,
}

#[derive(Debug, Default, Deserialize)]
struct SumConfig {
    #[serde(default)]
    strict: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SumAggregation {
    pub text: TextPolicy,
}

impl SumAggregation {
    pub const KEY: &'static str = "SUM";

    pub fn strict() -> Self {
        Self {
            text: TextPolicy::Reject,
        }
    }

    pub fn from_config(config: &serde_json::Value) -> Result<Self, OpError> {
        let cfg: SumConfig = parse_config(Self::KEY, config)?;
        Ok(if cfg.strict {
            Self::strict()
        } else {
            Self::default()
        })
    }
}

impl Aggregation for SumAggregation {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn native_longs(&self) -> bool {
        true
    }

    fn native_doubles(&self) -> bool {
        true
    }

    fn aggregate_longs(&self, left: i64, right: i64) -> Result<i64, OpError> {
        left.checked_add(right)
            .ok_or_else(|| OpError::Overflow(Self::KEY.to_string()))
    }

    fn aggregate_doubles(&self, left: f64, right: f64) -> Result<f64, OpError> {
        Ok(left + right)
    }

    fn aggregate(&self, left: Value, right: Value) -> Result<Value, OpError> {
        match (&left, &right) {
            (Value::Long(l), Value::Long(r)) => self.aggregate_longs(*l, *r).map(Value::Long),
            (Value::Long(_) | Value::Double(_), Value::Long(_) | Value::Double(_)) => {
                // both numeric, at least one double
                Ok(Value::Double(as_f64(&left) + as_f64(&right)))
            }
            (Value::Text(_), _) | (_, Value::Text(_)) if self.text == TextPolicy::Concatenate => {
                reject_rich(Self::KEY, &left)?;
                reject_rich(Self::KEY, &right)?;
                Ok(Value::text(format!("{left}{right}")))
            }
            _ => {
                reject_numeric_only(Self::KEY, &left)?;
                reject_numeric_only(Self::KEY, &right)?;
                Err(OpError::Invariant(format!("{} could not merge {left:?} and {right:?}", Self::KEY)))
            }
        }
    }
}

/// Counts contributing rows.
#[derive(Debug, Clone, Default)]
pub struct CountAggregation;

impl CountAggregation {
    pub const KEY: &'static str = "COUNT";
}

impl Aggregation for CountAggregation {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn native_longs(&self) -> bool {
        true
    }

    fn aggregate_longs(&self, left: i64, right: i64) -> Result<i64, OpError> {
        left.checked_add(right)
            .ok_or_else(|| OpError::Overflow(Self::KEY.to_string()))
    }

    fn aggregate(&self, left: Value, right: Value) -> Result<Value, OpError> {
        match (&left, &right) {
            (Value::Long(l), Value::Long(r)) => self.aggregate_longs(*l, *r).map(Value::Long),
            (Value::Long(_), other) | (other, _) => Err(OpError::unsupported(Self::KEY, other.kind())),
        }
    }

    fn wrap(&self, value: Value) -> Result<Value, OpError> {
        match value {
            Value::Long(_) => Ok(value),
            other => Err(OpError::unsupported(Self::KEY, other.kind())),
        }
    }

    fn lift_input(&self, _raw: Value) -> Value {
        Value::Long(1)
    }
}

/// `MIN` and `MAX`: numbers compare numerically, texts lexicographically.
#[derive(Debug, Clone)]
pub struct ExtremumAggregation {
    key: &'static str,
    keep: Ordering,
}

impl ExtremumAggregation {
    pub fn min() -> Self {
        Self {
            key: "MIN",
            keep: Ordering::Less,
        }
    }

    pub fn max() -> Self {
        Self {
            key: "MAX",
            keep: Ordering::Greater,
        }
    }

    fn pick(&self, left: Value, right: Value, ord: Ordering) -> Value {
        if ord == self.keep || ord == Ordering::Equal {
            left
        } else {
            right
        }
    }
}

impl Aggregation for ExtremumAggregation {
    fn key(&self) -> &str {
        self.key
    }

    fn native_longs(&self) -> bool {
        true
    }

    fn native_doubles(&self) -> bool {
        true
    }

    fn aggregate_longs(&self, left: i64, right: i64) -> Result<i64, OpError> {
        Ok(if left.cmp(&right) == self.keep { left } else { right })
    }

    fn aggregate_doubles(&self, left: f64, right: f64) -> Result<f64, OpError> {
        Ok(if left.total_cmp(&right) == self.keep { left } else { right })
    }

    fn aggregate(&self, left: Value, right: Value) -> Result<Value, OpError> {
        let ord = match (&left, &right) {
            (Value::Long(l), Value::Long(r)) => l.cmp(r),
            (Value::Long(_) | Value::Double(_), Value::Long(_) | Value::Double(_)) => {
                as_f64(&left).total_cmp(&as_f64(&right))
            }
            (Value::Text(l), Value::Text(r)) => l.cmp(r),
            (Value::Text(_), other) | (other, Value::Text(_)) => {
                return Err(OpError::unsupported(self.key, other.kind()));
            }
            _ => {
                let offending = if left.is_numeric() { &right } else { &left };
                return Err(OpError::unsupported(self.key, offending.kind()));
            }
        };
        Ok(self.pick(left, right, ord))
    }
}

/// For stores written exactly once per slice. A second write is a bug.
#[derive(Debug, Clone, Default)]
pub struct ExclusiveAggregation;

impl ExclusiveAggregation {
    pub const KEY: &'static str = "EXCLUSIVE";

    fn twice() -> OpError {
        OpError::Invariant("slice written twice into an exclusive column".to_string())
    }
}

impl Aggregation for ExclusiveAggregation {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn native_longs(&self) -> bool {
        true
    }

    fn native_doubles(&self) -> bool {
        true
    }

    fn aggregate_longs(&self, _left: i64, _right: i64) -> Result<i64, OpError> {
        Err(Self::twice())
    }

    fn aggregate_doubles(&self, _left: f64, _right: f64) -> Result<f64, OpError> {
        Err(Self::twice())
    }

    fn aggregate(&self, _left: Value, _right: Value) -> Result<Value, OpError> {
        Err(Self::twice())
    }
}

// --- helpers shared by the aggregations ---

fn as_f64(v: &Value) -> f64 {
    v.as_f64().unwrap_or(f64::NAN)
}

fn reject_rich(key: &str, v: &Value) -> Result<(), OpError> {
    match v {
        Value::Set(_) | Value::Carrier(_) => Err(OpError::unsupported(key, v.kind())),
        _ => Ok(()),
    }
}

fn reject_numeric_only(key: &str, v: &Value) -> Result<(), OpError> {
    if v.is_numeric() {
        Ok(())
    } else {
        Err(OpError::unsupported(key, v.kind()))
    }
}

pub(crate) fn parse_config<T>(key: &str, config: &serde_json::Value) -> Result<T, OpError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| OpError::InvalidConfig {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Merge `right` into `left`, in place when `left` is not shared.
pub(crate) fn merge_carriers<C, F>(
    key: &str,
    left: Arc<dyn AggregationCarrier>,
    right: &dyn AggregationCarrier,
    merge: F,
) -> Result<Value, OpError>
where
    C: AggregationCarrier + Clone,
    F: Fn(&mut C, &C),
{
    let right = right
        .as_any()
        .downcast_ref::<C>()
        .ok_or_else(|| OpError::Invariant(format!("{key} got a foreign carrier")))?;

    let mut left = left;
    let merged_in_place = match Arc::get_mut(&mut left).and_then(|c| c.as_any_mut().downcast_mut::<C>()) {
        Some(c) => {
            merge(c, right);
            true
        }
        None => false,
    };
    if merged_in_place {
        return Ok(Value::Carrier(left));
    }

    let mut copy = left
        .as_any()
        .downcast_ref::<C>()
        .cloned()
        .ok_or_else(|| OpError::Invariant(format!("{key} got a foreign carrier")))?;
    merge(&mut copy, right);
    Ok(Value::carrier(copy))
}
