//! Step DAG construction: interning, expansion rules, configuration errors.

use std::sync::Arc;

use cubedag_column::{InMemoryStepCache, MultitypeColumn, StepCache};
use cubedag_core::error::Error;
use cubedag_core::filter::Filter;
use cubedag_core::measure::{Measure, MeasureForest};
use cubedag_core::slice::Slice;
use cubedag_core::step::{GroupBy, QueryOption, QueryStep};
use cubedag_operators::{OpError, Registry};
use cubedag_planner::verify::{assert_acyclic, assert_cached_are_sinks, assert_interned, assert_topological};
use cubedag_planner::{DagBuilder, Evaluation, PlanError, Recombinator};

fn build(forest: &MeasureForest, roots: &[QueryStep]) -> Result<cubedag_planner::StepsDag, PlanError> {
    let registry = Registry::new();
    DagBuilder::new(forest, &registry).build(roots)
}

fn diamond() -> MeasureForest {
    MeasureForest::new("diamond")
        .with(Measure::sum("a"))
        .with(Measure::combinator("b", ["a"], "SUM"))
        .with(Measure::combinator("c", ["a"], "SUM"))
        .with(Measure::combinator("d", ["b", "c"], "SUM"))
}

#[test]
fn test_diamond_shares_the_leaf() {
    let dag = build(&diamond(), &[QueryStep::new("d")]).unwrap();
    assert_eq!(dag.len(), 4);
    assert_eq!(dag.roots().len(), 1);

    let leaf = dag.id_of(&QueryStep::new("a")).unwrap();
    assert_eq!(dag.parent_counts()[leaf.index()], 2);
    assert!(dag.vertex(leaf).is_leaf());

    assert_interned(&dag);
    assert_acyclic(&dag);
    assert_topological(&dag, &dag.topological_order());
}

#[test]
fn test_vertex_count_is_distinct_steps() {
    let forest = diamond();
    let by_country = GroupBy::of(["country"]);
    let roots = [
        QueryStep::new("d"),
        QueryStep::new("b"),
        QueryStep::new("d").with_group_by(by_country.clone()),
        QueryStep::new("d"),
    ];
    let dag = build(&forest, &roots).unwrap();
    // four grand-total steps plus four grouped ones; repeated roots collapse
    assert_eq!(dag.len(), 8);
    assert_eq!(dag.roots().len(), 3);
    assert!(dag.id_of(&QueryStep::new("a").with_group_by(by_country)).is_some());
}

#[test]
fn test_underlyings_keep_declaration_order() {
    let forest = MeasureForest::new("t")
        .with(Measure::sum("x"))
        .with(Measure::sum("y"))
        .with(Measure::combinator("diff", ["y", "x"], "SUBTRACT"));
    let dag = build(&forest, &[QueryStep::new("diff")]).unwrap();
    let root = dag.roots()[0];
    let names: Vec<&str> = dag
        .underlyings(root)
        .iter()
        .map(|u| dag.vertex(*u).step.measure.as_str())
        .collect();
    assert_eq!(names, ["y", "x"]);
}

#[test]
fn test_cycle_reports_the_path() {
    let forest = MeasureForest::new("loop")
        .with(Measure::combinator("a", ["b"], "SUM"))
        .with(Measure::combinator("b", ["c"], "SUM"))
        .with(Measure::combinator("c", ["a"], "SUM"));
    let err = build(&forest, &[QueryStep::new("a")]).unwrap_err();
    assert_eq!(
        err.as_core(),
        Some(&Error::CycleDetected {
            path: vec!["a".into(), "b".into(), "c".into(), "a".into()]
        })
    );
}

#[test]
fn test_self_filtering_is_a_cycle() {
    let forest = MeasureForest::new("loop").with(Measure::filtrator("x", "x", Filter::equals("k", 1)));
    let err = build(&forest, &[QueryStep::new("x")]).unwrap_err();
    assert!(matches!(err.as_core(), Some(Error::CycleDetected { .. })));
}

#[test]
fn test_unknown_measure() {
    let forest = MeasureForest::new("t")
        .with(Measure::sum("a"))
        .with(Measure::combinator("total", ["a", "missing"], "SUM"));
    let err = build(&forest, &[QueryStep::new("total")]).unwrap_err();
    assert_eq!(err.as_core(), Some(&Error::UnknownMeasure("missing".into())));

    let registry = Registry::new();
    let dag = DagBuilder::new(&forest, &registry)
        .unknown_measures_are_empty(true)
        .build(&[QueryStep::new("total")])
        .unwrap();
    let missing = dag.id_of(&QueryStep::new("missing")).unwrap();
    assert_eq!(dag.vertex(missing).kind, "empty");

    // the per-step option does the same
    let step = QueryStep::new("nope").with_option(QueryOption::UnknownMeasuresAreEmpty);
    let dag = build(&forest, &[step]).unwrap();
    assert!(matches!(
        dag.vertices()[0].evaluation,
        Evaluation::Recombine(Recombinator::AlwaysEmpty)
    ));
}

#[test]
fn test_unknown_operator_and_arity() {
    let forest = MeasureForest::new("t")
        .with(Measure::aggregator("weird", "amount", "MEDIAN_OF_MEDIANS"))
        .with(Measure::sum("a"))
        .with(Measure::combinator("ratio", ["a"], "DIVIDE"));

    let err = build(&forest, &[QueryStep::new("weird")]).unwrap_err();
    assert_eq!(err, PlanError::Operator(OpError::UnknownOperator("MEDIAN_OF_MEDIANS".into())));

    let err = build(&forest, &[QueryStep::new("ratio")]).unwrap_err();
    assert!(matches!(
        err,
        PlanError::Operator(OpError::Arity {
            expected: 2,
            actual: 1,
            ..
        })
    ));
}

#[test]
fn test_filtrator_ands_its_filter() {
    let forest = MeasureForest::new("t")
        .with(Measure::sum("amount"))
        .with(Measure::filtrator("euro", "amount", Filter::equals("ccy", "EUR")));
    let root = QueryStep::new("euro").with_filter(Filter::equals("country", "FR"));
    let dag = build(&forest, &[root]).unwrap();
    let expected = QueryStep::new("amount")
        .with_filter(Filter::equals("country", "FR").and(Filter::equals("ccy", "EUR")));
    assert!(dag.id_of(&expected).is_some());
}

#[test]
fn test_unfiltrator_rejects_mixed_disjunction() {
    let forest = MeasureForest::new("t")
        .with(Measure::sum("amount"))
        .with(Measure::unfiltrator("any_ccy", "amount", ["ccy"], false));
    let mixed = Filter::equals("ccy", "EUR").or(Filter::equals("country", "FR"));
    let err = build(&forest, &[QueryStep::new("any_ccy").with_filter(mixed)]).unwrap_err();
    assert!(matches!(err.as_core(), Some(Error::UnsupportedFilterShape(_))));

    let pure = Filter::equals("ccy", "EUR").or(Filter::equals("ccy", "USD"));
    let dag = build(&forest, &[QueryStep::new("any_ccy").with_filter(pure)]).unwrap();
    assert!(dag.id_of(&QueryStep::new("amount")).is_some());
}

#[test]
fn test_bucketor_underlyings_group_finer() {
    let forest = MeasureForest::new("t")
        .with(Measure::sum("amount"))
        .with(Measure::bucketor("by_continent", ["amount"], "SUM", "SUM", ["continent"]));
    let root = QueryStep::new("by_continent").with_group_by(GroupBy::of(["ccy"]));
    let dag = build(&forest, &[root]).unwrap();
    let fine = QueryStep::new("amount").with_group_by(GroupBy::of(["ccy", "continent"]));
    assert!(dag.id_of(&fine).is_some());
    assert_eq!(dag.len(), 2);
}

#[test]
fn test_cached_steps_are_not_expanded() {
    let forest = diamond();
    let registry = Registry::new();
    let cache = InMemoryStepCache::new();
    let mut stored = MultitypeColumn::hybrid(cubedag_operators::registry::exclusive());
    stored.merge(Slice::grand_total()).on_long(42).unwrap();
    cache.put(QueryStep::new("b"), Arc::new(stored));

    let dag = DagBuilder::new(&forest, &registry)
        .with_cache(&cache)
        .build(&[QueryStep::new("d")])
        .unwrap();
    assert_cached_are_sinks(&dag);
    let b = dag.vertex(dag.id_of(&QueryStep::new("b")).unwrap());
    assert!(b.is_cached());
    // "a" is still reached through "c"
    assert_eq!(dag.len(), 4);

    cache.put(QueryStep::new("d"), Arc::new(MultitypeColumn::hybrid(cubedag_operators::registry::exclusive())));
    let dag = DagBuilder::new(&forest, &registry)
        .with_cache(&cache)
        .build(&[QueryStep::new("d")])
        .unwrap();
    assert_eq!(dag.len(), 1);
}

#[test]
fn test_fingerprint_is_stable() {
    let forest = diamond();
    let first = build(&forest, &[QueryStep::new("d")]).unwrap().fingerprint().unwrap();
    let again = build(&forest, &[QueryStep::new("d")]).unwrap().fingerprint().unwrap();
    assert_eq!(first, again);

    let other = build(&forest, &[QueryStep::new("b")]).unwrap().fingerprint().unwrap();
    assert_ne!(first, other);
}

#[test]
fn test_wide_fan_in_stays_linear() {
    let mut forest = MeasureForest::new("wide").with(Measure::sum("base"));
    let names: Vec<String> = (0..1024).map(|i| format!("m{i}")).collect();
    for n in &names {
        forest.add(Measure::combinator(n.as_str(), ["base"], "SUM"));
    }
    forest.add(Measure::combinator("top", names.iter().map(String::as_str), "SUM"));
    let dag = build(&forest, &[QueryStep::new("top")]).unwrap();
    assert_eq!(dag.len(), 1026);
    let base = dag.id_of(&QueryStep::new("base")).unwrap();
    assert_eq!(dag.parent_counts()[base.index()], 1024);
}
