//! Multitype column: representations, layouts, carriers.

use std::sync::Arc;

use cubedag_column::{MultitypeColumn, ValueConsumer};
use cubedag_core::config::ColumnStrategy;
use cubedag_core::measure::OperatorBinding;
use cubedag_core::slice::Slice;
use cubedag_core::value::Value;
use cubedag_operators::{Aggregation, OpError, Registry};
use serde_json::json;

fn agg(key: &str) -> Arc<dyn Aggregation> {
    Registry::new().make_aggregation(&OperatorBinding::new(key)).unwrap()
}

fn country(c: &str) -> Slice {
    Slice::from_pairs([("country", c)])
}

const STRATEGIES: [ColumnStrategy; 3] = [
    ColumnStrategy::Navigable,
    ColumnStrategy::Hash,
    ColumnStrategy::Hybrid,
];

#[derive(Default)]
struct Seen {
    longs: Vec<i64>,
    doubles: Vec<f64>,
    objects: Vec<Value>,
    missing: usize,
}

impl ValueConsumer for Seen {
    fn on_long(&mut self, v: i64) {
        self.longs.push(v);
    }
    fn on_double(&mut self, v: f64) {
        self.doubles.push(v);
    }
    fn on_object(&mut self, v: &Value) {
        self.objects.push(v.clone());
    }
    fn on_missing(&mut self) {
        self.missing += 1;
    }
}

#[test]
fn test_same_kind_merges_stay_primitive() {
    for strategy in STRATEGIES {
        let mut col = MultitypeColumn::new(agg("SUM"), strategy);
        col.merge(country("FR")).on_long(2).unwrap();
        col.merge(country("FR")).on_long(3).unwrap();

        let mut seen = Seen::default();
        col.read(&country("FR")).accept(&mut seen);
        assert_eq!(seen.longs, [5], "{strategy:?}");

        col.read(&country("US")).accept(&mut seen);
        assert_eq!(seen.missing, 1);
    }
}

#[test]
fn test_long_plus_double_is_exact_double() {
    for strategy in STRATEGIES {
        let mut col = MultitypeColumn::new(agg("SUM"), strategy);
        col.merge(country("FR")).on_long(2).unwrap();
        col.merge(country("US")).on_long(7).unwrap();
        col.merge(country("FR")).on_double(0.25).unwrap();

        assert_eq!(col.read(&country("FR")).to_value(), Some(Value::Double(2.25)), "{strategy:?}");
        // other slices keep their own kind
        assert_eq!(col.read(&country("US")).to_value(), Some(Value::Long(7)));
    }
}

#[test]
fn test_long_plus_text_follows_sum_policy() {
    let mut col = MultitypeColumn::hybrid(agg("SUM"));
    col.merge(country("FR")).on_long(1).unwrap();
    col.merge(country("FR")).on_object(Value::text("a")).unwrap();
    assert_eq!(col.read(&country("FR")).to_value(), Some(Value::text("1a")));

    let strict = Registry::new()
        .make_aggregation(&OperatorBinding::with_config("SUM", json!({ "strict": true })))
        .unwrap();
    let mut col = MultitypeColumn::hybrid(strict);
    col.merge(country("FR")).on_long(1).unwrap();
    let err = col.merge(country("FR")).on_object(Value::text("a")).unwrap_err();
    assert!(matches!(err, OpError::UnsupportedValue { .. }));
}

fn strict_sum() -> Arc<dyn Aggregation> {
    Registry::new()
        .make_aggregation(&OperatorBinding::with_config("SUM", json!({ "strict": true })))
        .unwrap()
}

#[test]
fn test_rejected_merge_keeps_previous_value() {
    for strategy in STRATEGIES {
        let mut col = MultitypeColumn::new(strict_sum(), strategy);

        // primitive slot: the rejected text must not promote or drop it
        col.merge(country("FR")).on_long(5).unwrap();
        assert!(col.merge(country("FR")).on_object(Value::text("x")).is_err());
        assert_eq!(col.read(&country("FR")).to_value(), Some(Value::Long(5)), "{strategy:?}");

        // object slot
        col.merge(country("US")).on_long(1).unwrap();
        col.merge(country("US")).on_double(0.5).unwrap();
        assert!(col.merge(country("US")).on_object(Value::text("x")).is_err());
        assert_eq!(col.read(&country("US")).to_value(), Some(Value::Double(1.5)), "{strategy:?}");

        assert!(col.merge(country("FR")).on_object(Value::text("y")).is_err());
        assert_eq!(col.read(&country("FR")).to_value(), Some(Value::Long(5)), "{strategy:?}");
        assert_eq!(col.len(), 2, "{strategy:?}");

        col.merge(country("FR")).on_long(1).unwrap();
        assert_eq!(col.read(&country("FR")).to_value(), Some(Value::Long(6)), "{strategy:?}");
    }
}

#[test]
fn test_mixed_kinds_read_back_with_their_own_kind() {
    for strategy in STRATEGIES {
        let mut col = MultitypeColumn::new(agg("SUM"), strategy);
        col.merge(country("AA")).on_long(1).unwrap();
        col.merge(country("BB")).on_long(2).unwrap();
        col.merge(country("CC")).on_double(0.25).unwrap();
        col.merge(country("BB")).on_double(0.5).unwrap();

        let mut seen = Seen::default();
        for c in ["AA", "BB", "CC"] {
            col.read(&country(c)).accept(&mut seen);
        }
        assert_eq!(seen.longs, [1], "{strategy:?}");
        assert_eq!(seen.doubles, [2.5, 0.25], "{strategy:?}");
        assert!(seen.objects.is_empty(), "{strategy:?}");
    }
}

#[test]
fn test_object_side_primitives_reach_primitive_callbacks() {
    let mut col = MultitypeColumn::hash(agg("SUM"));
    col.merge(country("FR")).on_object(Value::Long(4)).unwrap();
    let mut seen = Seen::default();
    col.read(&country("FR")).accept(&mut seen);
    assert_eq!(seen.longs, [4]);
    assert!(seen.objects.is_empty());
}

#[test]
fn test_hybrid_switches_to_hash_on_first_out_of_order_slice() {
    let mut col = MultitypeColumn::hybrid(agg("SUM"));
    for c in ["AA", "BB", "CC"] {
        col.merge(country(c)).on_long(1).unwrap();
    }
    assert!(!col.is_hash());
    col.merge(country("BB")).on_long(1).unwrap();
    assert!(!col.is_hash());

    col.merge(country("AB")).on_long(1).unwrap();
    assert!(col.is_hash());
    assert_eq!(col.len(), 4);
    assert_eq!(col.read(&country("BB")).to_value(), Some(Value::Long(2)));

    // once hashed, always hashed
    col.merge(country("ZZ")).on_long(1).unwrap();
    assert!(col.is_hash());
}

#[test]
fn test_layouts_agree() {
    let inputs: Vec<(Slice, i64)> = (0..200)
        .map(|i| (country(&format!("C{:03}", (i * 53) % 97)), i))
        .collect();
    let mut columns: Vec<_> = STRATEGIES
        .iter()
        .map(|s| MultitypeColumn::new(agg("SUM"), *s))
        .collect();
    for col in &mut columns {
        for (slice, v) in &inputs {
            col.merge(slice.clone()).on_long(*v).unwrap();
        }
    }
    let reference = &columns[0];
    for col in &columns[1..] {
        assert_eq!(col.slices(), reference.slices());
        for slice in reference.slices() {
            assert_eq!(col.read(&slice).to_value(), reference.read(&slice).to_value());
        }
    }
}

#[test]
fn test_navigable_iterates_sorted() {
    let mut col = MultitypeColumn::navigable(agg("SUM"));
    for c in ["US", "DE", "FR"] {
        col.merge(country(c)).on_long(1).unwrap();
    }
    let order: Vec<Slice> = col.iter().map(|(s, _)| s.clone()).collect();
    assert_eq!(order, [country("DE"), country("FR"), country("US")]);
}

#[test]
fn test_purge_keeps_read_values() {
    let rank = Registry::new()
        .make_aggregation(&OperatorBinding::with_config("RANK", json!({ "rank": 2 })))
        .unwrap();
    for strategy in STRATEGIES {
        let mut col = MultitypeColumn::new(Arc::clone(&rank), strategy);
        for v in [3, 8, 5] {
            col.merge(country("FR")).on_long(v).unwrap();
        }
        col.merge(country("US")).on_long(1).unwrap();

        assert_eq!(col.read(&country("FR")).to_value(), Some(Value::Long(5)));
        // a single value has no second rank
        assert_eq!(col.read(&country("US")).to_value(), None);

        let purged = col.clone().purge_aggregation_carriers();
        assert_eq!(purged.read(&country("FR")).to_value(), Some(Value::Long(5)));
        assert!(matches!(
            purged.read(&country("FR")).to_raw_value(),
            Some(Value::Long(5))
        ));
        assert!(purged.read(&country("US")).is_missing());
        assert_eq!(purged.len(), 1);
    }
}

#[test]
fn test_count_distinct_column() {
    let mut col = MultitypeColumn::hybrid(agg("COUNT_DISTINCT"));
    for c in ["a", "b", "a", "c"] {
        col.merge(Slice::grand_total()).on_object(Value::text(c)).unwrap();
    }
    assert_eq!(col.read(&Slice::grand_total()).to_value(), Some(Value::Long(3)));
}

#[test]
fn test_exclusive_column_rejects_double_write() {
    let mut col = MultitypeColumn::hybrid(cubedag_operators::registry::exclusive());
    col.merge(country("FR")).on_long(1).unwrap();
    assert!(col.merge(country("FR")).on_long(1).is_err());
}

#[test]
fn test_compact_keeps_values() {
    let mut col = MultitypeColumn::hash(agg("MAX"));
    for i in 0..100 {
        col.merge(country(&format!("C{i}"))).on_double(i as f64).unwrap();
    }
    col.compact();
    assert_eq!(col.len(), 100);
    assert_eq!(col.read(&country("C42")).to_value(), Some(Value::Double(42.0)));
}

#[test]
fn test_on_value_none_writes_nothing() {
    let mut col = MultitypeColumn::hybrid(agg("SUM"));
    col.merge(country("FR")).on_value(None).unwrap();
    assert!(col.is_empty());
}
