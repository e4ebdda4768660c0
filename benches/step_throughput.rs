//! Step throughput benchmarks for the drone arena
//!
//! Run with: cargo bench --bench step_throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use drone_arena::config::EnvConfig;
use drone_arena::game::constants::physics::FRAME_SKIP;
use drone_arena::game::observation::compute_observations;
use drone_arena::game::state::Env;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn create_env(num_drones: usize) -> Env {
    Env::with_config(EnvConfig {
        num_drones,
        num_agents: num_drones,
        seed: 7,
        map_index: None,
        ..EnvConfig::default()
    })
    .unwrap()
}

fn randomize_actions(rng: &mut ChaCha8Rng, env: &mut Env) {
    for v in env.actions_mut().iter_mut() {
        *v = rng.gen_range(-1.0..=1.0);
    }
}

/// Full agent steps with random actions, including round resets
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.sample_size(50);

    for drones in [2, 4] {
        let mut env = create_env(drones);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // Each step simulates FRAME_SKIP frames for every drone
        group.throughput(Throughput::Elements((drones * FRAME_SKIP) as u64));
        group.bench_with_input(BenchmarkId::new("random_actions", drones), &drones, |b, _| {
            b.iter(|| {
                randomize_actions(&mut rng, &mut env);
                black_box(env.step().unwrap())
            })
        });
    }
    group.finish();
}

/// Observation encoding alone
fn bench_observations(c: &mut Criterion) {
    let mut group = c.benchmark_group("observations");
    group.sample_size(100);

    for drones in [2, 4] {
        let mut env = create_env(drones);
        group.bench_with_input(BenchmarkId::new("encode", drones), &drones, |b, _| {
            b.iter(|| {
                compute_observations(&mut env);
                black_box(env.observations().len())
            })
        });
    }
    group.finish();
}

/// Environment construction and round setup
fn bench_reset(c: &mut Criterion) {
    let mut env = create_env(4);
    c.bench_function("reset", |b| b.iter(|| black_box(env.reset().unwrap())));
}

criterion_group!(benches, bench_step, bench_observations, bench_reset);
criterion_main!(benches);
