use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use flapsim_core::{Evaluator, FlapConfig, FnPolicy, NullObserver, Observation};
use std::time::Duration;

fn chase_gap(obs: &Observation) -> f64 {
    if obs.below_gap_center() { 1.0 } else { 0.0 }
}

fn bench_generations(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    let samples: usize = std::env::var("FLAPSIM_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(20);
    group.sample_size(samples);
    group.measurement_time(Duration::from_secs(10));
    let populations: Vec<usize> = std::env::var("FLAPSIM_BENCH_BIRDS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![10_usize, 100, 1000]);

    for &birds in &populations {
        group.bench_function(format!("birds{birds}_score5"), |b| {
            b.iter_batched(
                || {
                    let config = FlapConfig {
                        gap_min: 200,
                        gap_max: 240,
                        score_threshold: 5,
                        rng_seed: Some(0xF1A9),
                        ..FlapConfig::headless()
                    };
                    let evaluator = Evaluator::new(config).expect("evaluator");
                    let policies: Vec<_> = (0..birds)
                        .map(|_| FnPolicy::new("chaser", chase_gap as fn(&Observation) -> f64))
                        .collect();
                    (evaluator, policies)
                },
                |(mut evaluator, mut policies)| {
                    let report = evaluator
                        .evaluate(&mut policies, &mut NullObserver)
                        .expect("generation");
                    criterion::black_box(report.score);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generations);
criterion_main!(benches);
