//! Microbenchmarks for the binding's hot paths: registry lookups, layout
//! compilation, and field marshaling through the boundary.
//!
//! Run with: `cargo bench --bench marshal_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_abi::FieldKind;
use strata_bind::{compile_layout, ComponentShape, SparseMap, World};
use strata_testkit::MemEngine;

fn position() -> ComponentShape {
    ComponentShape::new("Position")
        .field("x", FieldKind::F32, 0.0f32)
        .field("y", FieldKind::F32, 0.0f32)
}

// ---------------------------------------------------------------------------
// Benchmark 1: sparse map churn
// ---------------------------------------------------------------------------

fn bench_sparse_map_churn(c: &mut Criterion) {
    c.bench_function("sparse_map_set_get_delete_1k", |b| {
        let mut map: SparseMap<u64> = SparseMap::with_capacity(1024);
        b.iter(|| {
            for k in 0..1024u32 {
                map.set(k, k as u64);
            }
            for k in 0..1024u32 {
                black_box(map.get(k));
            }
            for k in 0..1024u32 {
                map.delete(k);
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 2: layout compilation
// ---------------------------------------------------------------------------

fn bench_layout_compile(c: &mut Criterion) {
    let shape = ComponentShape::new("Wide")
        .field("a", FieldKind::U8, 0u8)
        .field("b", FieldKind::U16, 0u16)
        .field("c", FieldKind::U32, 0u32)
        .field("d", FieldKind::U64, 0u64)
        .field("e", FieldKind::F32, 0.0f32)
        .field("f", FieldKind::F64, 0.0f64)
        .field("g", FieldKind::Bool, false)
        .field("h", FieldKind::Str, "")
        .field("i", FieldKind::ArrayU32, Vec::<u32>::new())
        .field("j", FieldKind::ArrayF32, Vec::<f32>::new());

    c.bench_function("compile_layout_10_fields", |b| {
        b.iter(|| black_box(compile_layout(&shape, &[]).expect("compiles")));
    });
}

// ---------------------------------------------------------------------------
// Benchmark 3: scalar write/read through a bound view
// ---------------------------------------------------------------------------

fn bench_bound_scalar_roundtrip(c: &mut Criterion) {
    let world = World::new(MemEngine::new());
    let entity = world.create_entity(None);
    let mut pos = world.add(entity, &position()).expect("adds");

    c.bench_function("bound_f32_set_get", |b| {
        b.iter(|| {
            pos.set("x", black_box(4.5f32));
            black_box(pos.get_f32("x"));
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 4: query decode of a 1k-row group
// ---------------------------------------------------------------------------

fn bench_query_field_decode(c: &mut Criterion) {
    let world = World::new(MemEngine::new());
    for _ in 0..1000 {
        let entity = world.create_entity(None);
        world.add(entity, &position()).expect("adds");
    }
    let mut query = world.query(&["Position"]).expect("creates");

    c.bench_function("query_field_1k_rows", |b| {
        b.iter(|| {
            query.iter();
            while query.next() {
                black_box(query.field("Position").expect("decodes").len());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_sparse_map_churn,
    bench_layout_compile,
    bench_bound_scalar_roundtrip,
    bench_query_field_decode
);
criterion_main!(benches);
