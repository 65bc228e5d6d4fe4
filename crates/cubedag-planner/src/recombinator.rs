//! Rebuilding a step's store from the stores of its underlyings.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

use cubedag_column::MultitypeColumn;
use cubedag_core::config::ColumnStrategy;
use cubedag_core::slice::Slice;
use cubedag_core::step::{GroupBy, QueryStep};
use cubedag_core::value::Value;
use cubedag_operators::registry::exclusive;
use cubedag_operators::{Aggregation, Combination, OpError};

/// How a vertex produces its store. One variant per behavior; the planner
/// picks it from the measure kind.
#[derive(Clone)]
pub enum Recombinator {
    /// Fed by the data source, never recombined.
    Leaf {
        column: String,
        aggregation: Arc<dyn Aggregation>,
    },
    /// Combine underlying values slice by slice.
    Combine { combination: Arc<dyn Combination> },
    /// Combine per fine slice, then coarsen to `group_by` and re-aggregate.
    Bucket {
        combination: Arc<dyn Combination>,
        aggregation: Arc<dyn Aggregation>,
        group_by: GroupBy,
    },
    /// The single underlying's store is this step's store.
    PassThrough,
    AlwaysEmpty,
}

impl Recombinator {
    pub fn kind(&self) -> &'static str {
        match self {
            Recombinator::Leaf { .. } => "leaf",
            Recombinator::Combine { .. } => "combine",
            Recombinator::Bucket { .. } => "bucket",
            Recombinator::PassThrough => "pass_through",
            Recombinator::AlwaysEmpty => "always_empty",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Recombinator::Leaf { .. })
    }

    /// Build the store of `step` from its underlyings' stores, given in
    /// declaration order.
    pub fn recombine(
        &self,
        step: &QueryStep,
        underlyings: &[Arc<MultitypeColumn>],
        strategy: ColumnStrategy,
    ) -> Result<Arc<MultitypeColumn>, OpError> {
        match self {
            Recombinator::Leaf { .. } => Err(OpError::Invariant(format!(
                "leaf step '{step}' is fed by the data source, not recombined"
            ))),
            Recombinator::PassThrough => underlyings.first().cloned().ok_or_else(|| {
                OpError::Invariant(format!("pass-through step '{step}' has no underlying"))
            }),
            Recombinator::AlwaysEmpty => Ok(Arc::new(MultitypeColumn::empty(exclusive()))),
            Recombinator::Combine { combination } => {
                let mut out = MultitypeColumn::new(exclusive(), strategy);
                for_each_union_slice(underlyings, |slice, operands| {
                    let combined = combination.combine(&slice, &operands)?;
                    out.merge(slice).on_value(combined)
                })?;
                Ok(Arc::new(out))
            }
            Recombinator::Bucket {
                combination,
                aggregation,
                group_by,
            } => {
                let mut out = MultitypeColumn::new(Arc::clone(aggregation), strategy);
                for_each_union_slice(underlyings, |slice, operands| {
                    let Some(combined) = combination.combine(&slice, &operands)? else {
                        return Ok(());
                    };
                    let coarse = slice.coarsen(group_by.iter());
                    out.merge(coarse).on_object(aggregation.lift_input(combined))
                })?;
                Ok(Arc::new(out))
            }
        }
    }
}

/// Visit the sorted, deduplicated union of the underlyings' slices with the
/// value each underlying holds there (`None` where it holds nothing).
///
/// A k-way merge over each underlying's sorted slices, so the union itself is
/// never materialized.
fn for_each_union_slice<F>(underlyings: &[Arc<MultitypeColumn>], mut f: F) -> Result<(), OpError>
where
    F: FnMut(Slice, Vec<Option<Value>>) -> Result<(), OpError>,
{
    let mut cursors: Vec<_> = underlyings.iter().map(|u| u.sorted_slices()).collect();
    let mut heads = BinaryHeap::with_capacity(cursors.len());
    for (i, cursor) in cursors.iter_mut().enumerate() {
        if let Some(slice) = cursor.next() {
            heads.push(Reverse((slice, i)));
        }
    }

    while let Some(Reverse((slice, i))) = heads.pop() {
        if let Some(next) = cursors[i].next() {
            heads.push(Reverse((next, i)));
        }
        // drain the other cursors sitting on the same slice
        while let Some(&Reverse((other, j))) = heads.peek() {
            if other != slice {
                break;
            }
            heads.pop();
            if let Some(next) = cursors[j].next() {
                heads.push(Reverse((next, j)));
            }
        }
        let operands = underlyings.iter().map(|u| u.read(slice).to_value()).collect();
        f(slice.clone(), operands)?;
    }
    Ok(())
}

impl fmt::Debug for Recombinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recombinator::Leaf {
                column,
                aggregation,
            } => write!(f, "Leaf({column}, {})", aggregation.key()),
            Recombinator::Combine { combination } => write!(f, "Combine({})", combination.key()),
            Recombinator::Bucket {
                combination,
                aggregation,
                group_by,
            } => write!(
                f,
                "Bucket({}, {}, {group_by})",
                combination.key(),
                aggregation.key()
            ),
            Recombinator::PassThrough => write!(f, "PassThrough"),
            Recombinator::AlwaysEmpty => write!(f, "AlwaysEmpty"),
        }
    }
}
