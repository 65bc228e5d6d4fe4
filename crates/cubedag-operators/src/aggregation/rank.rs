//! `RANK`: the K-th best value of a slice, accumulated as a top-K carrier.
//!
//! Config: `{ "rank": 2, "order": "desc" }` (defaults: rank 1, descending).

use std::any::Any;

use serde::Deserialize;

use cubedag_core::value::{AggregationCarrier, Value};

use super::{merge_carriers, parse_config};
use crate::traits::{Aggregation, OpError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RankOrder {
    Asc,
    Desc,
}

#[derive(Debug, Deserialize)]
struct RankConfig {
    #[serde(default = "default_rank")]
    rank: usize,
    #[serde(default = "default_order")]
    order: RankOrder,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            rank: default_rank(),
            order: default_order(),
        }
    }
}

fn default_rank() -> usize {
    1
}

fn default_order() -> RankOrder {
    RankOrder::Desc
}

/// Best `rank` values seen so far, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct RankCarrier {
    rank: usize,
    descending: bool,
    top: Vec<Value>,
}

impl RankCarrier {
    fn new(rank: usize, descending: bool, first: Value) -> Self {
        Self {
            rank,
            descending,
            top: vec![first],
        }
    }

    fn merge(&mut self, other: &RankCarrier) {
        self.top.extend(other.top.iter().cloned());
        let descending = self.descending;
        self.top.sort_by(|a, b| {
            let ord = numeric(a).total_cmp(&numeric(b));
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        self.top.truncate(self.rank);
    }

    /// Values kept so far, best first.
    pub fn top(&self) -> &[Value] {
        &self.top
    }
}

fn numeric(v: &Value) -> f64 {
    v.as_f64().unwrap_or(f64::NAN)
}

impl AggregationCarrier for RankCarrier {
    fn finish(&self) -> Option<Value> {
        self.top.get(self.rank - 1).cloned()
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

#[derive(Debug, Clone)]
pub struct RankAggregation {
    rank: usize,
    descending: bool,
}

impl RankAggregation {
    pub const KEY: &'static str = "RANK";

    pub fn new(rank: usize, descending: bool) -> Result<Self, OpError> {
        if rank == 0 {
            return Err(OpError::InvalidConfig {
                key: Self::KEY.to_string(),
                reason: "rank starts at 1".to_string(),
            });
        }
        Ok(Self { rank, descending })
    }

    pub fn from_config(config: &serde_json::Value) -> Result<Self, OpError> {
        let cfg: RankConfig = parse_config(Self::KEY, config)?;
        Self::new(cfg.rank, matches!(cfg.order, RankOrder::Desc))
    }
}

impl Aggregation for RankAggregation {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn wrap(&self, value: Value) -> Result<Value, OpError> {
        match value {
            Value::Long(_) | Value::Double(_) => {
                Ok(Value::carrier(RankCarrier::new(self.rank, self.descending, value)))
            }
            Value::Carrier(ref c) if c.as_any().is::<RankCarrier>() => Ok(value),
            other => Err(OpError::unsupported(Self::KEY, other.kind())),
        }
    }

    fn aggregate(&self, left: Value, right: Value) -> Result<Value, OpError> {
        match (self.wrap(left)?, self.wrap(right)?) {
            (Value::Carrier(l), Value::Carrier(r)) => {
                merge_carriers::<RankCarrier, _>(Self::KEY, l, r.as_ref(), RankCarrier::merge)
            }
            _ => Err(OpError::Invariant("rank wrap must yield carriers".to_string())),
        }
    }
}
