//! Operator traits + the operator error type.
//!
//! Columns call `Aggregation` for every merge into an existing slice;
//! recombinators call `Combination` once per slice of a derived step.

use std::fmt;

use cubedag_core::slice::Slice;
use cubedag_core::value::{Value, ValueKind};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    /// An operator received a kind of value it cannot handle. Never coerced.
    #[error("{operator} does not accept {kind} values")]
    UnsupportedValue { operator: String, kind: ValueKind },

    #[error("{0}: long overflow")]
    Overflow(String),

    #[error("unknown operator key '{0}'")]
    UnknownOperator(String),

    #[error("invalid config for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("{operator} expects {expected} operands, got {actual}")]
    Arity {
        operator: String,
        expected: usize,
        actual: usize,
    },

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl OpError {
    pub fn unsupported(operator: &str, kind: ValueKind) -> Self {
        OpError::UnsupportedValue {
            operator: operator.to_string(),
            kind,
        }
    }
}

/// Merges two values landing in the same slice.
///
/// Invariants:
/// - `native_longs()` implies `aggregate_longs` never fails with
///   `UnsupportedValue` (same for doubles).
/// - `aggregate` receives values already passed through `wrap`.
/// - Implementations are pure: same inputs, same output.
pub trait Aggregation: fmt::Debug + Send + Sync + 'static {
    /// Stable registry key, e.g. "SUM".
    fn key(&self) -> &str;

    /// Longs are kept in primitive storage under this aggregation.
    fn native_longs(&self) -> bool {
        false
    }

    /// Doubles are kept in primitive storage under this aggregation.
    fn native_doubles(&self) -> bool {
        false
    }

    fn aggregate_longs(&self, _left: i64, _right: i64) -> Result<i64, OpError> {
        Err(OpError::unsupported(self.key(), ValueKind::Long))
    }

    fn aggregate_doubles(&self, _left: f64, _right: f64) -> Result<f64, OpError> {
        Err(OpError::unsupported(self.key(), ValueKind::Double))
    }

    /// Generic path, used for mixed kinds and object values.
    fn aggregate(&self, left: Value, right: Value) -> Result<Value, OpError>;

    /// Representation of a value entering the object side (e.g. a carrier).
    fn wrap(&self, value: Value) -> Result<Value, OpError> {
        Ok(value)
    }

    /// Per-row contribution of a raw source value.
    fn lift_input(&self, raw: Value) -> Value {
        raw
    }
}

/// Combines the values of several underlying measures for one slice.
///
/// A `None` operand means the underlying has no value for the slice; it is
/// not zero unless the combination says so.
pub trait Combination: fmt::Debug + Send + Sync + 'static {
    fn key(&self) -> &str;

    /// Checked when the measure is expanded, before anything runs.
    fn check_arity(&self, _operands: usize) -> Result<(), OpError> {
        Ok(())
    }

    fn combine(&self, slice: &Slice, operands: &[Option<Value>]) -> Result<Option<Value>, OpError>;
}
