#![forbid(unsafe_code)]
//! cubedag-column: per-step result stores.
//!
//! A `MultitypeColumn` maps slices to values of heterogeneous kinds. Longs
//! and doubles stay in primitive storage as long as a slice only ever sees one
//! kind; the step's aggregation decides how values landing in the same slice
//! merge, and mixed kinds promote the slice to the object side.
//!
//! Also home to the `StepCache` trait, since cached entries are columns.

pub mod array;
pub mod cache;
pub mod column;
pub mod hash;
pub mod navigable;
pub mod value;

pub use cache::{InMemoryStepCache, StepCache};
pub use column::MultitypeColumn;
pub use value::{ValueConsumer, ValueProvider, ValueReceiver};

/// Column operations fail with operator errors (e.g. a type error raised by
/// the aggregation).
pub type Result<T> = std::result::Result<T, cubedag_operators::OpError>;
