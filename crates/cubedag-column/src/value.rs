//! Write and read sides of a column, dispatching on value kind without
//! boxing primitives.

use cubedag_core::slice::Slice;
use cubedag_core::value::Value;

use crate::column::MultitypeColumn;
use crate::Result;

/// A value on its way into a store.
#[derive(Debug, Clone)]
pub(crate) enum Incoming {
    Long(i64),
    Double(f64),
    Object(Value),
}

impl Incoming {
    pub(crate) fn into_value(self) -> Value {
        match self {
            Incoming::Long(v) => Value::Long(v),
            Incoming::Double(v) => Value::Double(v),
            Incoming::Object(v) => v,
        }
    }
}

/// Receives one value for one slice. Obtained from `MultitypeColumn::merge`.
pub struct ValueReceiver<'a> {
    pub(crate) column: &'a mut MultitypeColumn,
    pub(crate) slice: Slice,
}

impl<'a> ValueReceiver<'a> {
    pub fn on_long(self, v: i64) -> Result<()> {
        self.column.merge_incoming(self.slice, Incoming::Long(v))
    }

    pub fn on_double(self, v: f64) -> Result<()> {
        self.column.merge_incoming(self.slice, Incoming::Double(v))
    }

    /// Any value. Longs and doubles are routed to their primitive path.
    pub fn on_object(self, v: Value) -> Result<()> {
        let incoming = match v {
            Value::Long(l) => Incoming::Long(l),
            Value::Double(d) => Incoming::Double(d),
            other => Incoming::Object(other),
        };
        self.column.merge_incoming(self.slice, incoming)
    }

    /// Write an optional value; `None` leaves the slice untouched.
    pub fn on_value(self, v: Option<Value>) -> Result<()> {
        match v {
            Some(v) => self.on_object(v),
            None => Ok(()),
        }
    }

    /// Copy whatever a provider holds; nothing when it is missing.
    pub fn on_provider(self, provider: ValueProvider<'_>) -> Result<()> {
        match provider {
            ValueProvider::Missing => Ok(()),
            ValueProvider::Long(l) => self.on_long(l),
            ValueProvider::Double(d) => self.on_double(d),
            ValueProvider::Object(v) => self.on_object(v.clone()),
        }
    }
}

/// Visitor for the read side.
pub trait ValueConsumer {
    fn on_long(&mut self, v: i64);
    fn on_double(&mut self, v: f64);
    fn on_object(&mut self, v: &Value);
    fn on_missing(&mut self) {}
}

/// What a store holds for a slice.
#[derive(Debug, Clone, Copy)]
pub enum ValueProvider<'a> {
    Missing,
    Long(i64),
    Double(f64),
    Object(&'a Value),
}

impl<'a> ValueProvider<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, ValueProvider::Missing)
    }

    /// Dispatch to `consumer`. Carriers are finished first, and primitives
    /// held on the object side go to the primitive callbacks, so consumers
    /// see the same thing whatever the representation.
    pub fn accept<C: ValueConsumer + ?Sized>(self, consumer: &mut C) {
        match self {
            ValueProvider::Missing => consumer.on_missing(),
            ValueProvider::Long(l) => consumer.on_long(l),
            ValueProvider::Double(d) => consumer.on_double(d),
            ValueProvider::Object(v) => match v {
                Value::Long(l) => consumer.on_long(*l),
                Value::Double(d) => consumer.on_double(*d),
                Value::Carrier(c) => match c.finish() {
                    Some(Value::Long(l)) => consumer.on_long(l),
                    Some(Value::Double(d)) => consumer.on_double(d),
                    Some(other) => consumer.on_object(&other),
                    None => consumer.on_missing(),
                },
                other => consumer.on_object(other),
            },
        }
    }

    /// Owned terminal value, `None` when missing (or an unfinished carrier).
    pub fn to_value(self) -> Option<Value> {
        struct Collect(Option<Value>);
        impl ValueConsumer for Collect {
            fn on_long(&mut self, v: i64) {
                self.0 = Some(Value::Long(v));
            }
            fn on_double(&mut self, v: f64) {
                self.0 = Some(Value::Double(v));
            }
            fn on_object(&mut self, v: &Value) {
                self.0 = Some(v.clone());
            }
        }
        let mut c = Collect(None);
        self.accept(&mut c);
        c.0
    }

    /// Like `to_value`, but carriers are handed over unfinished. Used when
    /// the value is merged into another store of the same aggregation.
    pub fn to_raw_value(self) -> Option<Value> {
        match self {
            ValueProvider::Missing => None,
            ValueProvider::Long(l) => Some(Value::Long(l)),
            ValueProvider::Double(d) => Some(Value::Double(d)),
            ValueProvider::Object(v) => Some(v.clone()),
        }
    }
}
