use criterion::{black_box, criterion_group, criterion_main, Criterion};
use motion::{BlockRing, Planner, PlannerConfig};

fn benchmark_planner(c: &mut Criterion) {
    let config = PlannerConfig {
        steps_per_mm: [80.0, 80.0, 400.0],
        acceleration: [54_000.0, 54_000.0, 7_200.0],
        junction_deviation: 0.05,
    };

    // A zigzag program deep enough to keep the reverse/forward passes busy
    // across the whole look-ahead window.
    let mut targets = Vec::new();
    for i in 0..16 {
        let x = (i as f32) * 12.5;
        let y = if i % 2 == 0 { 0.0 } else { 40.0 };
        targets.push([x, y, 0.0f32]);
    }

    c.bench_function("plan_zigzag_16", |b| {
        b.iter(|| {
            let mut planner = Planner::new();
            let mut ring = BlockRing::new();
            for target in &targets {
                planner
                    .plan_buffer_line(
                        &mut ring,
                        black_box(&config),
                        black_box(target),
                        black_box(1800.0),
                        false,
                    )
                    .unwrap();
            }
            black_box(ring.len())
        })
    });

    c.bench_function("replan_under_full_ring", |b| {
        // Measure a single append into an almost-full ring: the worst-case
        // incremental cost upstream callers see per line.
        let mut planner = Planner::new();
        let mut ring = BlockRing::new();
        for target in &targets {
            planner
                .plan_buffer_line(&mut ring, &config, target, 1800.0, false)
                .unwrap();
        }
        let mut x = 300.0f32;
        b.iter(|| {
            ring.discard_tail();
            x += 1.0;
            planner
                .plan_buffer_line(&mut ring, &config, &[x, 0.0, 0.0], 1800.0, false)
                .unwrap();
        })
    });
}

criterion_group!(benches, benchmark_planner);
criterion_main!(benches);
