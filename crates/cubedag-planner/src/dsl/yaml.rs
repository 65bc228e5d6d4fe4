//! YAML loaders for measure forests and queries.
//!
//! Forest example:
//! ```yaml
//! name: sales
//! measures:
//!   - { name: k1, type: aggregator, column: k1 }
//!   - { name: k2, type: aggregator, column: k2, aggregation: SUM }
//!   - { name: k1PlusK2, type: combinator, underlyings: [k1, k2] }
//!   - name: euro
//!     type: filtrator
//!     underlying: k1
//!     filter: { column: { column: ccy, matcher: { equals: EUR } } }
//!   - name: top2
//!     type: aggregator
//!     column: k1
//!     aggregation: { key: RANK, config: { rank: 2 } }
//! ```
//!
//! Query example:
//! ```yaml
//! measures: [k1PlusK2]
//! group_by: [country]
//! filter: { column: { column: ccy, matcher: { in: [EUR, USD] } } }
//! ```

use cubedag_core::measure::MeasureForest;
use cubedag_core::step::CubeQuery;

use crate::error::{PlanError, Result};

/// Parse a forest. Duplicate measure names are rejected. Underlying names
/// are not resolved here; unknown ones surface when a query reaches them.
pub fn parse_yaml_forest(yaml_src: &str) -> Result<MeasureForest> {
    let forest: MeasureForest = serde_yaml::from_str(yaml_src)?;
    Ok(forest)
}

pub fn parse_yaml_query(yaml_src: &str) -> Result<CubeQuery> {
    let query: CubeQuery = serde_yaml::from_str(yaml_src)?;
    if query.measures.is_empty() {
        return Err(PlanError::Yaml("query names no measure".to_string()));
    }
    Ok(query)
}
