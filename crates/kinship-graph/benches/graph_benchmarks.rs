//! Graph storage benchmarks.
//!
//! - pack churn: create then destroy N entities through swap-erase.
//! - cascading destroy: destroy a folder holding N strong children.
//! - entity capture / restore round trip.
//!
//! Run with: `cargo bench --bench graph_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kinship_graph::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
struct Title(String);

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
struct Size(u64);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup() -> (Graph, TypeTag, TypeTag) {
    let mut schema = Schema::new();
    let folder = schema.declare_type("Folder").unwrap();
    let note = schema.declare_type("Note").unwrap();
    schema.add_component::<Title>(note, "title").unwrap();
    schema.add_component::<Size>(note, "size").unwrap();
    schema
        .declare_child(folder, note, Cardinality::OneToMany, Dependency::Strong)
        .unwrap();
    (Graph::new(schema).unwrap(), folder, note)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_pack_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_churn");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let (mut graph, _, note) = setup();
                let ids: Vec<EntityId> = (0..count)
                    .map(|_| graph.create(note, &EntityName::generic("n")).unwrap())
                    .collect();
                for id in ids.iter().step_by(2) {
                    graph.destroy(*id).unwrap();
                }
                black_box(graph.len())
            });
        });
    }
    group.finish();
}

fn bench_cascading_destroy(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascading_destroy");
    for count in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let (mut graph, folder, note) = setup();
                let root = graph.create(folder, &EntityName::unique("root")).unwrap();
                for _ in 0..count {
                    let id = graph.create(note, &EntityName::generic("n")).unwrap();
                    graph.add_child(root, id).unwrap();
                }
                graph.destroy(root).unwrap();
                black_box(graph.is_empty())
            });
        });
    }
    group.finish();
}

fn bench_capture_restore(c: &mut Criterion) {
    let (mut graph, folder, note) = setup();
    let root = graph.create(folder, &EntityName::unique("root")).unwrap();
    let id = graph.create(note, &EntityName::unique("subject")).unwrap();
    graph.set(id, Title("a fairly ordinary title".into())).unwrap();
    graph.set(id, Size(4096)).unwrap();
    graph.add_child(root, id).unwrap();
    let reference = graph.reference(id).unwrap();

    c.bench_function("capture_restore_round_trip", |b| {
        b.iter(|| {
            let id = graph.resolve(&reference).unwrap();
            let mut state = BinaryState::new();
            graph.capture_entity(id, &mut state).unwrap();
            graph.destroy(id).unwrap();
            black_box(graph.restore_entity(&reference, &mut state).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_pack_churn,
    bench_cascading_destroy,
    bench_capture_restore
);
criterion_main!(benches);
