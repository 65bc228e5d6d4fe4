#![forbid(unsafe_code)]
//! cubedag-core: the value types every other cubedag crate speaks.
//!
//! - `Slice`/`Coordinate`: where a value lives in the cube.
//! - `Filter`: the immutable predicate carried by every query step.
//! - `Measure`/`MeasureForest`: the measure-definition graph (read-only here).
//! - `QueryStep`/`CubeQuery`: one evaluation unit, and what users ask for.
//! - `Value`/`AggregationCarrier`: the object side of a multitype column.
//!
//! **No async, no IO** in this crate.

pub mod config;
pub mod error;
pub mod filter;
pub mod hash;
pub mod id;
pub mod measure;
pub mod prelude;
pub mod slice;
pub mod step;
pub mod value;

pub use error::{Error, Result};
