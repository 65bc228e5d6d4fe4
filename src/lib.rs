#![forbid(unsafe_code)]
//! cubedag: evaluates measures of a multidimensional cube.
//!
//! A query names measures, a filter and group-by columns. The planner
//! expands each measure into a DAG of query steps (shared steps become one
//! vertex), the executor computes every vertex exactly once with bounded
//! parallelism, and each step's result lands in a `MultitypeColumn`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cubedag::prelude::*;
//!
//! # async fn demo() -> std::result::Result<(), cubedag::exec::ExecError> {
//! let forest = MeasureForest::new("sales")
//!     .with(Measure::sum("k1"))
//!     .with(Measure::sum("k2"))
//!     .with(Measure::combinator("k1PlusK2", ["k1", "k2"], "SUM"));
//! let table: InMemoryTable = [Row::new().with("k1", 1).with("k2", 2)].into_iter().collect();
//!
//! let engine = Engine::new(EngineConfig::from_env(), Arc::new(forest), Arc::new(table));
//! let result = engine.execute(&CubeQuery::measure("k1PlusK2")).await?;
//! assert_eq!(result.value("k1PlusK2", &Slice::grand_total()), Some(Value::Long(3)));
//! # Ok(())
//! # }
//! ```

pub use cubedag_column as column;
pub use cubedag_core as core;
pub use cubedag_exec as exec;
pub use cubedag_operators as operators;
pub use cubedag_planner as planner;

pub mod prelude {
    pub use cubedag_column::{InMemoryStepCache, MultitypeColumn, StepCache, ValueConsumer, ValueProvider};
    pub use cubedag_core::prelude::*;
    pub use cubedag_exec::{
        CancelFlag, DataSource, Engine, ExecError, InMemoryTable, LeafRequest, QueryResult, Row,
        SourceError,
    };
    pub use cubedag_operators::{Aggregation, Combination, OpError, Registry};
    pub use cubedag_planner::{explain, parse_yaml_forest, parse_yaml_query, DagBuilder, StepsDag};
}
