//! Built-in combinations, applied slice by slice by Combinator and Bucketor
//! measures.

use serde::Deserialize;

use cubedag_core::slice::Slice;
use cubedag_core::value::Value;

use crate::aggregation::parse_config;
use crate::traits::{Combination, OpError};

/// Sum of the present operands; long while every operand is a long.
#[derive(Debug, Clone, Default)]
pub struct SumCombination;

impl Combination for SumCombination {
    fn key(&self) -> &str {
        "SUM"
    }

    fn combine(&self, _slice: &Slice, operands: &[Option<Value>]) -> Result<Option<Value>, OpError> {
        let mut acc: Option<Value> = None;
        for v in operands.iter().flatten() {
            let v = numeric(self.key(), v)?;
            acc = Some(match acc {
                None => v,
                Some(a) => add(self.key(), a, v)?,
            });
        }
        Ok(acc)
    }
}

/// `left - right`. A missing `left` yields no value; a missing `right` is
/// taken as zero.
#[derive(Debug, Clone, Default)]
pub struct SubtractCombination;

impl Combination for SubtractCombination {
    fn key(&self) -> &str {
        "SUBTRACT"
    }

    fn check_arity(&self, operands: usize) -> Result<(), OpError> {
        expect_arity(self.key(), 2, operands)
    }

    fn combine(&self, _slice: &Slice, operands: &[Option<Value>]) -> Result<Option<Value>, OpError> {
        expect_arity(self.key(), 2, operands.len())?;
        let Some(left) = &operands[0] else {
            return Ok(None);
        };
        let left = numeric(self.key(), left)?;
        let Some(right) = &operands[1] else {
            return Ok(Some(left));
        };
        let right = numeric(self.key(), right)?;
        Ok(Some(match (left, right) {
            (Value::Long(l), Value::Long(r)) => Value::Long(
                l.checked_sub(r)
                    .ok_or_else(|| OpError::Overflow(self.key().to_string()))?,
            ),
            (l, r) => Value::Double(to_f64(&l) - to_f64(&r)),
        }))
    }
}

/// Product of all operands; no value as soon as one is missing.
#[derive(Debug, Clone, Default)]
pub struct ProductCombination;

impl Combination for ProductCombination {
    fn key(&self) -> &str {
        "PRODUCT"
    }

    fn combine(&self, _slice: &Slice, operands: &[Option<Value>]) -> Result<Option<Value>, OpError> {
        let mut acc: Option<Value> = None;
        for v in operands {
            let Some(v) = v else {
                return Ok(None);
            };
            let v = numeric(self.key(), v)?;
            acc = Some(match (acc, v) {
                (None, v) => v,
                (Some(Value::Long(a)), Value::Long(b)) => Value::Long(
                    a.checked_mul(b)
                        .ok_or_else(|| OpError::Overflow(self.key().to_string()))?,
                ),
                (Some(a), b) => Value::Double(to_f64(&a) * to_f64(&b)),
            });
        }
        Ok(acc)
    }
}

/// `numerator / denominator` as a double; no value when either side is
/// missing or the denominator is zero.
#[derive(Debug, Clone, Default)]
pub struct DivideCombination;

impl Combination for DivideCombination {
    fn key(&self) -> &str {
        "DIVIDE"
    }

    fn check_arity(&self, operands: usize) -> Result<(), OpError> {
        expect_arity(self.key(), 2, operands)
    }

    fn combine(&self, _slice: &Slice, operands: &[Option<Value>]) -> Result<Option<Value>, OpError> {
        expect_arity(self.key(), 2, operands.len())?;
        let (Some(n), Some(d)) = (&operands[0], &operands[1]) else {
            return Ok(None);
        };
        let n = to_f64(&numeric(self.key(), n)?);
        let d = to_f64(&numeric(self.key(), d)?);
        if d == 0.0 {
            return Ok(None);
        }
        Ok(Some(Value::Double(n / d)))
    }
}

/// Smallest or largest present operand.
#[derive(Debug, Clone)]
pub struct ExtremumCombination {
    max: bool,
}

impl ExtremumCombination {
    pub fn min() -> Self {
        Self { max: false }
    }

    pub fn max() -> Self {
        Self { max: true }
    }
}

impl Combination for ExtremumCombination {
    fn key(&self) -> &str {
        if self.max {
            "MAX"
        } else {
            "MIN"
        }
    }

    fn combine(&self, _slice: &Slice, operands: &[Option<Value>]) -> Result<Option<Value>, OpError> {
        let mut best: Option<Value> = None;
        for v in operands.iter().flatten() {
            let v = numeric(self.key(), v)?;
            best = Some(match best {
                None => v,
                Some(b) => {
                    let ord = to_f64(&v).total_cmp(&to_f64(&b));
                    let better = if self.max { ord.is_gt() } else { ord.is_lt() };
                    if better {
                        v
                    } else {
                        b
                    }
                }
            });
        }
        Ok(best)
    }
}

/// First present operand, any kind.
#[derive(Debug, Clone, Default)]
pub struct CoalesceCombination;

impl Combination for CoalesceCombination {
    fn key(&self) -> &str {
        "COALESCE"
    }

    fn combine(&self, _slice: &Slice, operands: &[Option<Value>]) -> Result<Option<Value>, OpError> {
        Ok(operands.iter().flatten().next().cloned())
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConstantConfig {
    value: Option<serde_json::Value>,
}

/// The configured value on every slice any operand has, present or not.
/// Config: `{ "value": 42 }`.
#[derive(Debug, Clone)]
pub struct ConstantCombination {
    value: Value,
}

impl ConstantCombination {
    pub const KEY: &'static str = "CONSTANT";

    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn from_config(config: &serde_json::Value) -> Result<Self, OpError> {
        let cfg: ConstantConfig = parse_config(Self::KEY, config)?;
        let invalid = |reason: &str| OpError::InvalidConfig {
            key: Self::KEY.to_string(),
            reason: reason.to_string(),
        };
        let value = match cfg.value {
            Some(serde_json::Value::Number(n)) => match n.as_i64() {
                Some(l) => Value::Long(l),
                None => Value::Double(n.as_f64().ok_or_else(|| invalid("number out of range"))?),
            },
            Some(serde_json::Value::String(s)) => Value::text(s),
            Some(_) => return Err(invalid("value must be a number or a string")),
            None => return Err(invalid("missing 'value'")),
        };
        Ok(Self::new(value))
    }
}

impl Combination for ConstantCombination {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn combine(&self, _slice: &Slice, _operands: &[Option<Value>]) -> Result<Option<Value>, OpError> {
        Ok(Some(self.value.clone()))
    }
}

// --- helpers ---

fn expect_arity(key: &str, expected: usize, actual: usize) -> Result<(), OpError> {
    if expected == actual {
        Ok(())
    } else {
        Err(OpError::Arity {
            operator: key.to_string(),
            expected,
            actual,
        })
    }
}

/// Operand as a plain number, finishing carriers first.
fn numeric(key: &str, v: &Value) -> Result<Value, OpError> {
    match v.clone().resolved() {
        Some(n @ (Value::Long(_) | Value::Double(_))) => Ok(n),
        Some(other) => Err(OpError::unsupported(key, other.kind())),
        None => Err(OpError::unsupported(key, v.kind())),
    }
}

fn to_f64(v: &Value) -> f64 {
    v.as_f64().unwrap_or(f64::NAN)
}

fn add(key: &str, a: Value, b: Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Long(a), Value::Long(b)) => a
            .checked_add(b)
            .map(Value::Long)
            .ok_or_else(|| OpError::Overflow(key.to_string())),
        (a, b) => Ok(Value::Double(to_f64(&a) + to_f64(&b))),
    }
}
