//! Criterion benchmarks for the mutual-nearest-neighbour matcher.
//! Sizes: n in {100, 1_000, 10_000} points per side.
//! Results: by default under target/criterion.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use diffh::api::{match_points, AxisConvention, MatchCfg, Origin, Point, Zone};
use nalgebra::Vector2;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn survey(n: usize, origin: Origin, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let e = 466_000.0 + rng.gen_range(0.0..2_000.0);
            let nn = 658_000.0 + rng.gen_range(0.0..2_000.0);
            Point {
                id: format!("{i:06}"),
                x_raw: nn,
                y_raw: e,
                axis: AxisConvention::NorthingFirst,
                zone: Zone::Z7,
                canon: Some(Vector2::new(e, nn)),
                h: Some(rng.gen_range(100.0..150.0)),
                origin,
            }
        })
        .collect()
}

fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    for &n in &[100usize, 1_000, 10_000] {
        let input = survey(n, Origin::Input, 11);
        let reference = survey(n, Origin::Reference, 12);
        group.bench_with_input(BenchmarkId::new("mutual_nn", n), &n, |b, _| {
            b.iter(|| match_points(&input, &reference, &MatchCfg::default()).unwrap())
        });
        let capped = MatchCfg {
            max_distance: 5.0,
            ..MatchCfg::default()
        };
        group.bench_with_input(BenchmarkId::new("mutual_nn_capped", n), &n, |b, _| {
            b.iter(|| match_points(&input, &reference, &capped).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_matching);
criterion_main!(benches);
