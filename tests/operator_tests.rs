//! Aggregations, combinations and the operator registry.

use std::sync::Arc;

use cubedag_core::measure::OperatorBinding;
use cubedag_core::slice::Slice;
use cubedag_core::value::Value;
use cubedag_operators::{Aggregation, Combination, OpError, Registry};
use serde_json::json;

fn agg(key: &str) -> Arc<dyn Aggregation> {
    Registry::new().make_aggregation(&OperatorBinding::new(key)).unwrap()
}

fn agg_with(key: &str, config: serde_json::Value) -> Arc<dyn Aggregation> {
    Registry::new()
        .make_aggregation(&OperatorBinding::with_config(key, config))
        .unwrap()
}

fn comb(key: &str) -> Arc<dyn Combination> {
    Registry::new().make_combination(&OperatorBinding::new(key)).unwrap()
}

#[test]
fn test_sum_long_and_double_is_exact_double() {
    let sum = agg("SUM");
    let v = sum.aggregate(Value::Long(2), Value::Double(0.5)).unwrap();
    assert_eq!(v, Value::Double(2.5));
}

#[test]
fn test_sum_overflow_is_an_error() {
    let err = agg("SUM").aggregate_longs(i64::MAX, 1).unwrap_err();
    assert!(matches!(err, OpError::Overflow(_)));
}

#[test]
fn test_sum_text_policy() {
    let lenient = agg("SUM");
    assert_eq!(
        lenient.aggregate(Value::Long(1), Value::text("a")).unwrap(),
        Value::text("1a")
    );

    let strict = agg_with("SUM", json!({ "strict": true }));
    let err = strict.aggregate(Value::Long(1), Value::text("a")).unwrap_err();
    assert!(matches!(err, OpError::UnsupportedValue { .. }));
}

#[test]
fn test_min_max() {
    assert_eq!(agg("MIN").aggregate_longs(3, -2).unwrap(), -2);
    assert_eq!(agg("MAX").aggregate_doubles(3.0, -2.0).unwrap(), 3.0);
    assert_eq!(
        agg("MAX").aggregate(Value::Long(3), Value::Double(3.5)).unwrap(),
        Value::Double(3.5)
    );
    assert!(agg("MIN").aggregate(Value::Long(3), Value::text("x")).is_err());
}

#[test]
fn test_count_lifts_every_input_to_one() {
    let count = agg("COUNT");
    assert_eq!(count.lift_input(Value::text("anything")), Value::Long(1));
    assert_eq!(count.aggregate_longs(4, 1).unwrap(), 5);
}

#[test]
fn test_rank_carrier_finishes_to_kth_value() {
    let rank = agg_with("RANK", json!({ "rank": 2 }));
    let mut acc = rank.wrap(Value::Long(5)).unwrap();
    for v in [9, 1, 7] {
        acc = rank.aggregate(acc, Value::Long(v)).unwrap();
    }
    let Value::Carrier(c) = &acc else {
        panic!("rank accumulates in a carrier, got {acc:?}");
    };
    assert_eq!(c.finish(), Some(Value::Long(7)));

    let asc = agg_with("RANK", json!({ "rank": 1, "order": "asc" }));
    let acc = asc.aggregate(Value::Long(5), Value::Long(2)).unwrap();
    assert_eq!(acc.resolved(), Some(Value::Long(2)));
}

#[test]
fn test_rank_zero_is_rejected() {
    let err = Registry::new()
        .make_aggregation(&OperatorBinding::with_config("RANK", json!({ "rank": 0 })))
        .unwrap_err();
    assert!(matches!(err, OpError::InvalidConfig { .. }));
}

#[test]
fn test_union_and_count_distinct() {
    let union = agg("UNION");
    let set = union
        .aggregate(Value::Long(1), Value::Long(2))
        .and_then(|s| union.aggregate(s, Value::Long(1)))
        .unwrap();
    let Value::Set(items) = &set else {
        panic!("union yields a set, got {set:?}");
    };
    assert_eq!(items.len(), 2);
    assert!(union.aggregate(set, Value::Double(1.5)).is_err());

    let distinct = agg("COUNT_DISTINCT");
    let acc = distinct
        .aggregate(Value::text("a"), Value::text("b"))
        .and_then(|c| distinct.aggregate(c, Value::text("a")))
        .unwrap();
    assert_eq!(acc.resolved(), Some(Value::Long(2)));
}

#[test]
fn test_exclusive_rejects_second_write() {
    let excl = cubedag_operators::registry::exclusive();
    assert!(matches!(excl.aggregate_longs(1, 2), Err(OpError::Invariant(_))));
}

#[test]
fn test_combinations_treat_missing_as_absent() {
    let slice = Slice::grand_total();
    assert_eq!(
        comb("SUM").combine(&slice, &[Some(Value::Long(1)), None, Some(Value::Long(2))]).unwrap(),
        Some(Value::Long(3))
    );
    assert_eq!(comb("SUM").combine(&slice, &[None, None]).unwrap(), None);
    assert_eq!(
        comb("PRODUCT").combine(&slice, &[Some(Value::Long(3)), None]).unwrap(),
        None
    );
    assert_eq!(
        comb("COALESCE").combine(&slice, &[None, Some(Value::text("x"))]).unwrap(),
        Some(Value::text("x"))
    );
}

#[test]
fn test_divide() {
    let div = comb("DIVIDE");
    let slice = Slice::grand_total();
    assert_eq!(
        div.combine(&slice, &[Some(Value::Long(3)), Some(Value::Long(2))]).unwrap(),
        Some(Value::Double(1.5))
    );
    assert_eq!(div.combine(&slice, &[Some(Value::Long(3)), Some(Value::Long(0))]).unwrap(), None);
    assert!(matches!(div.check_arity(3), Err(OpError::Arity { .. })));
}

#[test]
fn test_constant_needs_a_value() {
    let reg = Registry::new();
    assert!(reg.make_combination(&OperatorBinding::new("CONSTANT")).is_err());
    let c = reg
        .make_combination(&OperatorBinding::with_config("CONSTANT", json!({ "value": 42 })))
        .unwrap();
    assert_eq!(
        c.combine(&Slice::grand_total(), &[None]).unwrap(),
        Some(Value::Long(42))
    );
}

#[test]
fn test_registry_keys_are_case_insensitive_and_extensible() {
    let mut reg = Registry::new();
    assert!(reg.make_aggregation(&OperatorBinding::new("sum")).is_ok());
    assert!(matches!(
        reg.make_aggregation(&OperatorBinding::new("MEDIAN")),
        Err(OpError::UnknownOperator(_))
    ));

    reg.register_aggregation("MEDIAN", |_| Ok(cubedag_operators::registry::exclusive()));
    assert!(reg.make_aggregation(&OperatorBinding::new("median")).is_ok());
}
