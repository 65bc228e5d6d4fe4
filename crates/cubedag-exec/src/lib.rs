#![forbid(unsafe_code)]
//! cubedag-exec: run a step DAG to completion.
//!
//! - `claim`: claim-or-join table; a step is computed by whoever touches it
//!   first and awaited by everybody else.
//! - `scheduler`: one tokio task per vertex, a semaphore bounding leaf
//!   fetches and recombinations, cooperative cancellation.
//! - `source`: the `DataSource` seam leaves are fed through.
//! - `runtime`: `Engine`, the query-level facade.

pub mod claim;
pub mod metrics;
pub mod runtime;
pub mod scheduler;
pub mod source;

pub use claim::ClaimTable;
pub use metrics::ExecStats;
pub use runtime::{Engine, ExecError, QueryResult};
pub use scheduler::{CancelFlag, StepExecutor, StepResults};
pub use source::{DataSource, InMemoryTable, LeafRequest, Row, SourceError};
