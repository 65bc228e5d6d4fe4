//! Set-based aggregations: `UNION` (the set itself) and `COUNT_DISTINCT`
//! (a set carrier finishing into its size).

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use cubedag_core::slice::Coordinate;
use cubedag_core::value::{AggregationCarrier, Value, ValueKind};

use super::merge_carriers;
use crate::traits::{Aggregation, OpError};

/// Union of the distinct values of a slice. Doubles are rejected: equality
/// of floating-point inputs is not a meaningful set membership.
#[derive(Debug, Clone, Default)]
pub struct UnionAggregation;

impl UnionAggregation {
    pub const KEY: &'static str = "UNION";
}

impl Aggregation for UnionAggregation {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn wrap(&self, value: Value) -> Result<Value, OpError> {
        match value {
            Value::Long(l) => Ok(Value::Set(Arc::new(BTreeSet::from([Coordinate::Long(l)])))),
            Value::Text(s) => Ok(Value::Set(Arc::new(BTreeSet::from([Coordinate::Text(s)])))),
            Value::Set(_) => Ok(value),
            other => Err(OpError::unsupported(Self::KEY, other.kind())),
        }
    }

    fn aggregate(&self, left: Value, right: Value) -> Result<Value, OpError> {
        match (self.wrap(left)?, self.wrap(right)?) {
            (Value::Set(mut l), Value::Set(r)) => {
                Arc::make_mut(&mut l).extend(r.iter().cloned());
                Ok(Value::Set(l))
            }
            _ => Err(OpError::unsupported(Self::KEY, ValueKind::Carrier)),
        }
    }
}

/// Distinct coordinates seen so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistinctCarrier {
    seen: BTreeSet<Coordinate>,
}

impl DistinctCarrier {
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn merge(&mut self, other: &DistinctCarrier) {
        self.seen.extend(other.seen.iter().cloned());
    }
}

impl AggregationCarrier for DistinctCarrier {
    fn finish(&self) -> Option<Value> {
        Some(Value::Long(self.seen.len() as i64))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_carrier(&self) -> Box<dyn AggregationCarrier> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountDistinctAggregation;

impl CountDistinctAggregation {
    pub const KEY: &'static str = "COUNT_DISTINCT";
}

impl Aggregation for CountDistinctAggregation {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn wrap(&self, value: Value) -> Result<Value, OpError> {
        match value {
            Value::Carrier(ref c) if c.as_any().is::<DistinctCarrier>() => Ok(value),
            Value::Set(s) => Ok(Value::carrier(DistinctCarrier {
                seen: s.as_ref().clone(),
            })),
            other => match other.to_coordinate() {
                Some(c) => Ok(Value::carrier(DistinctCarrier {
                    seen: BTreeSet::from([c]),
                })),
                None => Err(OpError::unsupported(Self::KEY, other.kind())),
            },
        }
    }

    fn aggregate(&self, left: Value, right: Value) -> Result<Value, OpError> {
        match (self.wrap(left)?, self.wrap(right)?) {
            (Value::Carrier(l), Value::Carrier(r)) => {
                merge_carriers::<DistinctCarrier, _>(Self::KEY, l, r.as_ref(), DistinctCarrier::merge)
            }
            _ => Err(OpError::Invariant("count distinct wrap must yield carriers".to_string())),
        }
    }
}
