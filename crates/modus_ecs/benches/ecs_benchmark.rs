//! # ECS Performance Benchmark
//!
//! Entity creation (including geometric growth), signature dispatch and
//! system updates over a committed population.
//!
//! Run with: `cargo bench --package modus_ecs --bench ecs_benchmark`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modus_ecs::{Component, Manager, Refs, Registry, RegistryBuilder, Signature, System, Tag};

/// Entities in the dispatch benchmarks.
const ENTITY_COUNT: usize = 100_000;

#[derive(Clone, Copy, Default)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Default)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Velocity {}

struct Frozen;
impl Tag for Frozen {}

struct Moving;
impl Signature for Moving {
    type Components = (Position, Velocity);
    type Tags = ();
}

#[derive(Default)]
struct Integrate {
    dt: f32,
}

impl System for Integrate {
    type Signature = Moving;

    #[inline]
    fn update(&mut self, _entity: usize, (p, v): Refs<'_, Moving>) {
        p.x += v.x * self.dt;
        p.y += v.y * self.dt;
        p.z += v.z * self.dt;
    }
}

fn registry() -> Arc<Registry> {
    Arc::new(
        RegistryBuilder::new()
            .component::<Position>()
            .component::<Velocity>()
            .tag::<Frozen>()
            .signature::<Moving>()
            .system::<Integrate>()
            .build()
            .expect("benchmark registry"),
    )
}

/// Builds a committed population; every `moving_every`-th entity moves.
fn populated(count: usize, moving_every: usize) -> Manager {
    let mut manager = Manager::with_capacity(registry(), count).expect("allocate");
    for i in 0..count {
        let entity = manager.new_entity().expect("entity");
        let f = i as f32;
        manager
            .add_component(entity, Position { x: f, y: f, z: f })
            .expect("position");
        if i % moving_every == 0 {
            manager
                .add_component(entity, Velocity { x: 0.1, y: 0.2, z: 0.3 })
                .expect("velocity");
        }
    }
    manager.apply_changes();
    manager
}

/// Benchmark: entity creation from an empty manager (growth included).
fn bench_new_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("new_entity");
    let registry = registry();

    for count in [1_000, 10_000, ENTITY_COUNT] {
        group.bench_with_input(BenchmarkId::new("growing", count), &count, |b, &count| {
            b.iter(|| {
                let mut manager = Manager::new(Arc::clone(&registry));
                for _ in 0..count {
                    black_box(manager.new_entity().expect("entity"));
                }
                manager.capacity()
            });
        });

        group.bench_with_input(BenchmarkId::new("preallocated", count), &count, |b, &count| {
            b.iter(|| {
                let mut manager =
                    Manager::with_capacity(Arc::clone(&registry), count).expect("allocate");
                for _ in 0..count {
                    black_box(manager.new_entity().expect("entity"));
                }
                manager.capacity()
            });
        });
    }

    group.finish();
}

/// Benchmark: `for_matching` over all or a fraction of the entities.
fn bench_for_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("for_matching");

    for moving_every in [1, 4] {
        let mut manager = populated(ENTITY_COUNT, moving_every);
        group.bench_function(BenchmarkId::new("moving_1_in", moving_every), |b| {
            b.iter(|| {
                manager
                    .for_matching::<Moving>(|_: usize, p: &mut Position, v: &mut Velocity| {
                        p.x += v.x * 0.016;
                        p.y += v.y * 0.016;
                        p.z += v.z * 0.016;
                    })
                    .expect("dispatch");
                black_box(manager.size())
            });
        });
    }

    group.finish();
}

/// Benchmark: `update` of a registered system.
fn bench_system_update(c: &mut Criterion) {
    let mut manager = populated(ENTITY_COUNT, 1);
    manager.system_mut::<Integrate>().expect("system").dt = 0.016;

    c.bench_function("update_integrate_100K", |b| {
        b.iter(|| {
            manager.update::<Integrate>().expect("update");
            black_box(manager.size())
        });
    });
}

/// Benchmark: handle resolution and component reads.
fn bench_handle_access(c: &mut Criterion) {
    let mut manager = Manager::with_capacity(registry(), ENTITY_COUNT).expect("allocate");
    let handles: Vec<_> = (0..ENTITY_COUNT)
        .map(|i| {
            let handle = manager.create_handle().expect("handle");
            handle
                .add_component(&mut manager, Position { x: i as f32, y: 0.0, z: 0.0 })
                .expect("position");
            handle
        })
        .collect();
    manager.apply_changes();

    c.bench_function("handle_get_component_100K", |b| {
        b.iter(|| {
            let mut sum = 0.0_f32;
            for handle in &handles {
                if let Ok(position) = handle.get_component::<Position>(&manager) {
                    sum += position.x;
                }
            }
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    bench_new_entity,
    bench_for_matching,
    bench_system_update,
    bench_handle_access,
);

criterion_main!(benches);
