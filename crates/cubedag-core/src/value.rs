//! Values held by the object side of a multitype column.
//!
//! Raw longs and doubles normally never reach this type: columns keep them in
//! primitive storage. A `Value` appears when a slice is promoted (mixed kinds),
//! when the operator keeps a richer accumulator (sets, carriers), or when a
//! caller hands over text.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::slice::Coordinate;

/// An operator-specific partial aggregate (e.g. "top-K so far").
///
/// A carrier stays mergeable until it is finished. Reading a carrier always
/// goes through `finish`, so callers only ever observe terminal values.
pub trait AggregationCarrier: fmt::Debug + Send + Sync + 'static {
    /// Terminal value; `None` when the carrier cannot produce one yet.
    fn finish(&self) -> Option<Value>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Copy used when the carrier is shared and must be merged into.
    fn clone_carrier(&self) -> Box<dyn AggregationCarrier>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Long,
    Double,
    Text,
    Set,
    Carrier,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Long => "long",
            ValueKind::Double => "double",
            ValueKind::Text => "text",
            ValueKind::Set => "set",
            ValueKind::Carrier => "carrier",
        };
        f.write_str(s)
    }
}

#[derive(Clone)]
pub enum Value {
    Long(i64),
    Double(f64),
    Text(Arc<str>),
    Set(Arc<BTreeSet<Coordinate>>),
    Carrier(Arc<dyn AggregationCarrier>),
}

impl Value {
    pub fn text(s: impl AsRef<str>) -> Self {
        Value::Text(Arc::from(s.as_ref()))
    }

    pub fn carrier<C: AggregationCarrier>(carrier: C) -> Self {
        Value::Carrier(Arc::new(carrier))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Long(_) => ValueKind::Long,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::Set(_) => ValueKind::Set,
            Value::Carrier(_) => ValueKind::Carrier,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Finish carriers; other values are returned unchanged.
    pub fn resolved(self) -> Option<Value> {
        match self {
            Value::Carrier(c) => c.finish(),
            other => Some(other),
        }
    }

    /// Convert into a coordinate, when the value has a coordinate form.
    pub fn to_coordinate(&self) -> Option<Coordinate> {
        match self {
            Value::Long(l) => Some(Coordinate::Long(*l)),
            Value::Double(d) => Some(Coordinate::Double(*d)),
            Value::Text(s) => Some(Coordinate::Text(Arc::clone(s))),
            Value::Set(_) | Value::Carrier(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Carrier(a), _) => a.finish().as_ref() == other.clone().resolved().as_ref(),
            (_, Value::Carrier(b)) => Some(self) == b.finish().as_ref(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(l) => write!(f, "Long({l})"),
            Value::Double(d) => write!(f, "Double({d})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Set(s) => f.debug_set().entries(s.iter()).finish(),
            Value::Carrier(c) => write!(f, "Carrier({c:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(l) => write!(f, "{l}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Set(s) => {
                write!(f, "[")?;
                for (i, c) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "]")
            }
            Value::Carrier(c) => match c.finish() {
                Some(v) => write!(f, "{v}"),
                None => write!(f, "<pending>"),
            },
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Long(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::text(v)
    }
}

impl From<Coordinate> for Value {
    fn from(c: Coordinate) -> Self {
        match c {
            Coordinate::Long(l) => Value::Long(l),
            Coordinate::Double(d) => Value::Double(d),
            Coordinate::Text(s) => Value::Text(s),
            Coordinate::Bool(b) => Value::Text(Arc::from(if b { "true" } else { "false" })),
        }
    }
}
