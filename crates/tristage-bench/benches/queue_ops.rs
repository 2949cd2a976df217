//! Criterion micro-benchmarks for queue traffic and command decoding.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tristage_bench::{demo_scene, key_burst, mixed_batch};
use tristage_core::Payload;
use tristage_engine::{
    command_queue, Outbox, PhysicsStage, QueueConfig, Stage, StageConfig, StageRunner, StateStage,
};
use tristage_test_utils::queue;

/// Benchmark: push 1K commands then drain them in one poll.
fn bench_push_drain_1k(c: &mut Criterion) {
    let (mut tx, mut rx) = command_queue("bench", &QueueConfig::default());
    let commands = key_burst(1_000);
    let mut out = Vec::with_capacity(1_000);

    c.bench_function("queue_push_drain_1k", |b| {
        b.iter(|| {
            for cmd in &commands {
                tx.push(cmd.clone()).unwrap();
            }
            out.clear();
            black_box(rx.drain_into(&mut out));
        });
    });
}

/// Benchmark: decode a 1K batch with 10% malformed commands.
fn bench_decode_mixed_1k(c: &mut Criterion) {
    let batch = mixed_batch(1_000);

    c.bench_function("payload_decode_mixed_1k", |b| {
        b.iter(|| {
            let ok = batch
                .iter()
                .filter(|cmd| Payload::from_command(cmd).is_ok())
                .count();
            black_box(ok);
        });
    });
}

/// Benchmark: one state-stage iteration over 1K key presses.
fn bench_state_step_1k(c: &mut Criterion) {
    let presses = key_burst(1_000);

    c.bench_function("state_step_1k_presses", |b| {
        b.iter_batched(
            || {
                let (mut user_tx, user_rx) = queue("user_input");
                let (objects_tx, objects_rx) = queue("object_updates");
                let (stats_tx, stats_rx) = queue("stats");
                for cmd in &presses {
                    user_tx.push(cmd.clone()).unwrap();
                }
                let runner = StageRunner::new(
                    StateStage::new(),
                    vec![user_rx],
                    vec![objects_tx, stats_tx],
                    StageConfig::default(),
                )
                .unwrap();
                (runner, user_tx, objects_rx, stats_rx)
            },
            |(mut runner, _user_tx, _objects_rx, stats_rx)| {
                runner.step();
                black_box(stats_rx.len());
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: physics update emitting 1K drawables.
fn bench_physics_update_1k(c: &mut Criterion) {
    let scene = demo_scene(1_000);

    c.bench_function("physics_update_1k_dirty", |b| {
        b.iter_batched(
            || {
                let mut stage = PhysicsStage::new();
                let mut out = Outbox::new(1);
                for (id, body) in &scene {
                    let update = Payload::ObjectUpdate {
                        id: *id,
                        position: body.position,
                        velocity: body.velocity,
                    };
                    stage.handle(update, &mut out).unwrap();
                }
                (stage, out)
            },
            |(mut stage, mut out)| {
                stage.update(std::time::Duration::ZERO, &mut out);
                black_box(out.len());
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_push_drain_1k,
    bench_decode_mixed_1k,
    bench_state_step_1k,
    bench_physics_update_1k
);
criterion_main!(benches);
