//! Criterion benchmarks for hex covering and thinning.
//! Spacings: {10, 25, 50} m over a 1 km irregular ring with 5_000 candidates.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use diffh::api::{
    thin, DiffKind, Evaluated, GridCfg, HexLayout, Ring, ToleranceVerdict, Verdict,
};
use nalgebra::Vector2;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn ring() -> Ring {
    let c = Vector2::new(467_000.0, 658_000.0);
    let verts: Vec<_> = (0..24)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / 24.0;
            let r = if i % 2 == 0 { 500.0 } else { 380.0 };
            c + Vector2::new(r * a.cos(), r * a.sin())
        })
        .collect();
    Ring::new(&verts).unwrap()
}

fn rows(n: usize, seed: u64) -> Vec<Evaluated> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let canon = Vector2::new(
                rng.gen_range(466_500.0..467_500.0),
                rng.gen_range(657_500.0..658_500.0),
            );
            let d = rng.gen_range(-0.1..0.1);
            Evaluated {
                input_index: i,
                id: format!("{i:06}"),
                x: canon.y,
                y: canon.x,
                canon,
                h: Some(120.0),
                service_h: Some(120.0 - d),
                diff_h_service: Some(d),
                pair: None,
                diff_h_service_pair: None,
                verdict: ToleranceVerdict {
                    diff_used: Some(DiffKind::Service),
                    verdict: Verdict::Within,
                },
            }
        })
        .collect()
}

fn bench_grid(c: &mut Criterion) {
    let ring = ring();
    let rows = rows(5_000, 21);
    let mut group = c.benchmark_group("grid");
    for &spacing in &[10.0f64, 25.0, 50.0] {
        let layout = HexLayout::new(ring.bbox().0, spacing).unwrap();
        group.bench_with_input(BenchmarkId::new("covering", spacing), &spacing, |b, _| {
            b.iter(|| layout.covering(&ring))
        });
        let cfg = GridCfg {
            spacing,
            ..GridCfg::default()
        };
        group.bench_with_input(BenchmarkId::new("thin", spacing), &spacing, |b, _| {
            b.iter(|| thin(&rows, &ring, &cfg).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_grid);
criterion_main!(benches);
