#![forbid(unsafe_code)]
//! cubedag-planner: from query steps to an immutable step DAG.
//!
//! Design:
//! - `expander` turns one step into its underlying steps plus the
//!   `Recombinator` that rebuilds the step's store from theirs.
//! - `dag` interns steps by value while expanding depth-first, so a step
//!   reached through many paths is one vertex.
//! - `explain`/`verify` walk a built DAG (rendering, debug checks).
//! - `dsl::yaml` loads measure forests and queries from YAML.
//!
//! Everything here is synchronous; exec drives the DAG.

pub mod dag;
pub mod dsl;
pub mod error;
pub mod expander;
pub mod explain;
pub mod recombinator;
pub mod verify;

pub use dag::{DagBuilder, Evaluation, StepVertex, StepsDag};
pub use dsl::yaml::{parse_yaml_forest, parse_yaml_query};
pub use error::{PlanError, Result};
pub use expander::{Expander, Expansion};
pub use recombinator::Recombinator;
