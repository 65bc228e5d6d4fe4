use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use cubedag::core::config::{ColumnStrategy, EngineConfig};
use cubedag::core::measure::{Measure, MeasureForest, MeasureGraph, OperatorBinding};
use cubedag::core::slice::Slice;
use cubedag::core::step::{CubeQuery, QueryStep};
use cubedag::column::MultitypeColumn;
use cubedag::exec::{Engine, InMemoryTable, Row};
use cubedag::operators::Registry;
use cubedag::planner::DagBuilder;

fn slices(n: usize, shuffled: bool) -> Vec<Slice> {
    (0..n)
        .map(|i| {
            let k = if shuffled { (i * 7919) % n } else { i };
            Slice::from_pairs([("country", format!("c{k:06}"))])
        })
        .collect()
}

fn bench_column_merge(c: &mut Criterion) {
    let sum = Registry::new()
        .make_aggregation(&OperatorBinding::new("SUM"))
        .unwrap();
    let mut group = c.benchmark_group("column_merge");
    for (label, shuffled) in [("sorted", false), ("shuffled", true)] {
        let input = slices(10_000, shuffled);
        for strategy in [ColumnStrategy::Navigable, ColumnStrategy::Hash, ColumnStrategy::Hybrid] {
            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), label),
                &input,
                |b, input| {
                    b.iter(|| {
                        let mut col = MultitypeColumn::new(Arc::clone(&sum), strategy);
                        for s in input {
                            col.merge(s.clone()).on_long(1).unwrap();
                        }
                        col
                    })
                },
            );
        }
    }
    group.finish();
}

fn wide_forest(width: usize) -> MeasureForest {
    let mut forest = MeasureForest::new("wide").with(Measure::sum("amount"));
    let names: Vec<String> = (0..width).map(|i| format!("m{i}")).collect();
    for n in &names {
        forest.add(Measure::combinator(n.as_str(), ["amount"], "SUM"));
    }
    forest.add(Measure::combinator("top", names.iter().map(String::as_str), "SUM"));
    forest
}

fn bench_dag(c: &mut Criterion) {
    let forest = wide_forest(256);
    let registry = Registry::new();
    c.bench_function("dag_build_256", |b| {
        b.iter(|| {
            DagBuilder::new(&forest, &registry)
                .build(&[QueryStep::new("top")])
                .unwrap()
        })
    });

    let table: InMemoryTable = (0..1_000)
        .map(|i| {
            Row::new()
                .with("country", format!("c{}", i % 50))
                .with("amount", i as i64)
        })
        .collect();
    let graph: Arc<dyn MeasureGraph> = Arc::new(forest);
    let engine = Engine::new(EngineConfig::default(), graph, Arc::new(table));
    let query = CubeQuery::measure("top").group_by(["country"]);
    let rt = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("execute_256_by_country", |b| {
        b.iter(|| rt.block_on(engine.execute(&query)).unwrap())
    });
}

criterion_group!(cubedag_benches, bench_column_merge, bench_dag);
criterion_main!(cubedag_benches);
