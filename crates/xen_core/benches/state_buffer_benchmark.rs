//! # State Buffer Benchmark
//!
//! Measures the cost of a simulation-side publish (index exchange plus the
//! carry-forward copy into the new write slot) and of a render-side swap.
//!
//! The read swap should stay flat regardless of entity count; the write swap
//! scales with snapshot size because of the copy.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use xen_core::{GameState, StateBuffer, TransformComponent};

fn populated_state(entities: usize) -> GameState {
    let mut state = GameState::new();
    for i in 0..entities {
        let e = state.create_entity();
        state.add_component(e, TransformComponent::from_position(Vec3::splat(i as f32)));
    }
    state
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_buffer_publish");

    for entities in [100, 1_000, 10_000] {
        let mut buffer = StateBuffer::new();
        buffer.init(&populated_state(entities)).unwrap();

        group.bench_with_input(BenchmarkId::new("swap_write", entities), &entities, |b, _| {
            b.iter(|| black_box(buffer.swap_write_buffer().unwrap()));
        });
    }

    group.finish();
}

fn bench_read_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_buffer_read");

    for entities in [100, 10_000] {
        let mut buffer = StateBuffer::new();
        buffer.init(&populated_state(entities)).unwrap();

        group.bench_with_input(BenchmarkId::new("swap_read", entities), &entities, |b, _| {
            b.iter(|| {
                buffer.swap_write_buffer().unwrap();
                black_box(buffer.swap_read_buffer().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_clone(c: &mut Criterion) {
    let mut group = c.benchmark_group("game_state_clone");

    for entities in [1_000, 10_000] {
        let source = populated_state(entities);
        let mut dest = GameState::new();

        group.bench_with_input(BenchmarkId::new("clone_from", entities), &entities, |b, _| {
            b.iter(|| dest.clone_from(black_box(&source)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_publish, bench_read_swap, bench_clone);
criterion_main!(benches);
