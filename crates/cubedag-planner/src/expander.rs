//! One step → its underlying steps and recombinator.

use cubedag_core::error::Error;
use cubedag_core::measure::{Measure, MeasureGraph, MeasureKind};
use cubedag_core::step::{QueryOption, QueryStep};
use cubedag_operators::Registry;

use crate::error::Result;
use crate::recombinator::Recombinator;

/// What a step needs and how to rebuild it.
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Measure kind name, or `"empty"` for a tolerated unknown measure.
    pub kind: &'static str,
    /// In declaration order; the recombinator receives their stores in the
    /// same order.
    pub underlyings: Vec<QueryStep>,
    pub recombinator: Recombinator,
}

impl Expansion {
    fn always_empty(kind: &'static str) -> Self {
        Self {
            kind,
            underlyings: Vec::new(),
            recombinator: Recombinator::AlwaysEmpty,
        }
    }

    fn pass_through(kind: &'static str, underlying: QueryStep) -> Self {
        Self {
            kind,
            underlyings: vec![underlying],
            recombinator: Recombinator::PassThrough,
        }
    }
}

pub struct Expander<'a> {
    graph: &'a dyn MeasureGraph,
    registry: &'a Registry,
    unknown_measures_are_empty: bool,
}

impl<'a> Expander<'a> {
    pub fn new(graph: &'a dyn MeasureGraph, registry: &'a Registry) -> Self {
        Self {
            graph,
            registry,
            unknown_measures_are_empty: false,
        }
    }

    pub fn unknown_measures_are_empty(mut self, yes: bool) -> Self {
        self.unknown_measures_are_empty = yes;
        self
    }

    pub fn expand(&self, step: &QueryStep) -> Result<Expansion> {
        let measure = match self.graph.measure(&step.measure) {
            Some(m) => m,
            None if self.unknown_measures_are_empty
                || step.has_option(QueryOption::UnknownMeasuresAreEmpty) =>
            {
                return Ok(Expansion::always_empty("empty"));
            }
            None => return Err(Error::UnknownMeasure(step.measure.clone()).into()),
        };
        self.expand_measure(step, measure)
    }

    fn expand_measure(&self, step: &QueryStep, measure: &Measure) -> Result<Expansion> {
        let kind = measure.kind_name();
        let expansion = match &measure.kind {
            MeasureKind::Aggregator {
                column,
                aggregation,
            } => Expansion {
                kind,
                underlyings: Vec::new(),
                recombinator: Recombinator::Leaf {
                    column: column.clone(),
                    aggregation: self.registry.make_aggregation(aggregation)?,
                },
            },

            MeasureKind::Combinator {
                underlyings,
                combination,
            } => {
                let combination = self.registry.make_combination(combination)?;
                combination.check_arity(underlyings.len())?;
                Expansion {
                    kind,
                    underlyings: underlyings.iter().map(|u| step.for_measure(u)).collect(),
                    recombinator: Recombinator::Combine { combination },
                }
            }

            MeasureKind::Bucketor {
                underlyings,
                combination,
                aggregation,
                group_by,
            } => {
                let combination = self.registry.make_combination(combination)?;
                combination.check_arity(underlyings.len())?;
                let fine = step.group_by.union(group_by);
                Expansion {
                    kind,
                    underlyings: underlyings
                        .iter()
                        .map(|u| step.for_measure(u).with_group_by(fine.clone()))
                        .collect(),
                    recombinator: Recombinator::Bucket {
                        combination,
                        aggregation: self.registry.make_aggregation(aggregation)?,
                        group_by: step.group_by.clone(),
                    },
                }
            }

            MeasureKind::Filtrator { underlying, filter } => {
                let filter = step.filter.clone().and(filter.clone());
                Expansion::pass_through(kind, step.for_measure(underlying).with_filter(filter))
            }

            MeasureKind::Unfiltrator {
                underlying,
                columns,
                inverse,
            } => {
                let filter = step.filter.retain_columns(columns.as_slice(), *inverse)?;
                Expansion::pass_through(kind, step.for_measure(underlying).with_filter(filter))
            }

            MeasureKind::Columnator {
                underlying,
                required_columns,
            } => {
                let available = required_columns.iter().all(|c| {
                    step.group_by.contains(c) || step.filter.mono_selected(c).is_some()
                });
                if available {
                    Expansion::pass_through(kind, step.for_measure(underlying))
                } else {
                    Expansion::always_empty(kind)
                }
            }

            MeasureKind::Empty => Expansion::always_empty(kind),
        };
        Ok(expansion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubedag_core::filter::Filter;
    use cubedag_core::measure::MeasureForest;
    use cubedag_core::step::GroupBy;

    fn forest() -> MeasureForest {
        MeasureForest::new("t")
            .with(Measure::sum("amount"))
            .with(Measure::columnator("per_ccy", "amount", ["ccy"]))
            .with(Measure::unfiltrator("all_ccy", "amount", ["ccy"], false))
    }

    #[test]
    fn columnator_accepts_mono_selected_column() {
        let f = forest();
        let reg = Registry::new();
        let ex = Expander::new(&f, &reg);

        let grand = QueryStep::new("per_ccy");
        assert!(matches!(
            ex.expand(&grand).unwrap().recombinator,
            Recombinator::AlwaysEmpty
        ));

        let pinned = QueryStep::new("per_ccy").with_filter(Filter::equals("ccy", "EUR"));
        let e = ex.expand(&pinned).unwrap();
        assert_eq!(e.underlyings.len(), 1);

        let grouped = QueryStep::new("per_ccy").with_group_by(GroupBy::of(["ccy"]));
        assert_eq!(ex.expand(&grouped).unwrap().underlyings.len(), 1);
    }

    #[test]
    fn unfiltrator_drops_the_named_columns() {
        let f = forest();
        let reg = Registry::new();
        let ex = Expander::new(&f, &reg);
        let step = QueryStep::new("all_ccy")
            .with_filter(Filter::equals("ccy", "EUR").and(Filter::equals("country", "FR")));
        let e = ex.expand(&step).unwrap();
        assert_eq!(e.underlyings[0].filter, Filter::equals("country", "FR"));
    }

    #[test]
    fn unknown_measure_is_tolerated_when_asked() {
        let f = forest();
        let reg = Registry::new();
        let step = QueryStep::new("nope");
        assert!(Expander::new(&f, &reg).expand(&step).is_err());

        let e = Expander::new(&f, &reg)
            .unknown_measures_are_empty(true)
            .expand(&step)
            .unwrap();
        assert_eq!(e.kind, "empty");
    }
}
