#![forbid(unsafe_code)]
//! cubedag-operators: how values are aggregated within a slice and combined
//! across measures.
//!
//! Design intent:
//! - Pure and synchronous (no async, no IO).
//! - Aggregations expose native long/double paths so columns can stay unboxed;
//!   the generic `Value` path is only taken for mixed kinds and rich values.
//! - Operators are looked up by key through the `Registry`, the same way
//!   measures name them.

pub mod aggregation;
pub mod combination;
pub mod registry;
pub mod traits;

pub use registry::Registry;
pub use traits::{Aggregation, Combination, OpError};
