//! Convenient re-exports for downstream crates.

pub use crate::config::{ColumnStrategy, EngineConfig};
pub use crate::error::{Error, Result};
pub use crate::filter::{Filter, Matcher};
pub use crate::id::StepId;
pub use crate::measure::{Measure, MeasureForest, MeasureGraph, MeasureKind, OperatorBinding};
pub use crate::slice::{Coordinate, Coordinates, Slice};
pub use crate::step::{CubeQuery, GroupBy, QueryOption, QueryStep};
pub use crate::value::{AggregationCarrier, Value, ValueKind};
