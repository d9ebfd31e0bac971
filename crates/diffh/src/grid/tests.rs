use super::*;
use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::evaluate::ToleranceVerdict;

fn square(x0: f64, y0: f64, side: f64) -> Ring {
    Ring::new(&[
        Vector2::new(x0, y0),
        Vector2::new(x0 + side, y0),
        Vector2::new(x0 + side, y0 + side),
        Vector2::new(x0, y0 + side),
        Vector2::new(x0, y0),
    ])
    .unwrap()
}

fn row(id: &str, e: f64, n: f64, diff: Option<f64>, verdict: Verdict) -> Evaluated {
    Evaluated {
        input_index: 0,
        id: id.into(),
        x: n,
        y: e,
        canon: Vector2::new(e, n),
        h: Some(100.0),
        service_h: diff.map(|d| 100.0 - d),
        diff_h_service: diff,
        pair: None,
        diff_h_service_pair: None,
        verdict: ToleranceVerdict {
            diff_used: diff.map(|_| DiffKind::Service),
            verdict,
        },
    }
}

#[test]
fn ring_rejects_degenerate_input() {
    let line = [
        Vector2::new(0.0, 0.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(2.0, 2.0),
    ];
    assert!(matches!(Ring::new(&line), Err(GridError::DegenerateBoundary(3))));
    assert!(Ring::new(&line[..2]).is_err());
}

#[test]
fn ring_containment_includes_edges() {
    let r = square(500_000.0, 600_000.0, 100.0);
    assert_eq!(r.len(), 4);
    assert!((r.area() - 10_000.0).abs() < 1e-6);
    assert!(r.contains(Vector2::new(500_050.0, 600_050.0)));
    assert!(r.contains(Vector2::new(500_000.0, 600_050.0)));
    assert!(!r.contains(Vector2::new(500_100.5, 600_050.0)));
}

#[test]
fn segments_cross_and_touch() {
    let v = Vector2::new;
    assert!(segments_intersect(v(0.0, 0.0), v(2.0, 2.0), v(0.0, 2.0), v(2.0, 0.0)));
    assert!(segments_intersect(v(0.0, 0.0), v(1.0, 0.0), v(1.0, 0.0), v(1.0, 5.0)));
    assert!(!segments_intersect(v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0), v(1.0, 1.0)));
}

#[test]
fn invalid_spacing_is_rejected() {
    let r = square(0.0, 0.0, 10.0);
    let cfg = GridCfg {
        spacing: 0.0,
        ..GridCfg::default()
    };
    assert_eq!(thin(&[], &r, &cfg).unwrap_err(), GridError::InvalidSpacing(0.0));
}

#[test]
fn neighbouring_centres_are_spacing_apart() {
    let layout = HexLayout::new(Vector2::new(10.0, 20.0), 25.0).unwrap();
    let c = layout.center(Axial::new(3, -2));
    for n in Axial::new(3, -2).neighbors() {
        assert!(((layout.center(n) - c).norm() - 25.0).abs() < 1e-9);
    }
    assert_eq!(layout.locate(c), Axial::new(3, -2));
}

#[test]
fn covering_cells_cover_ring_without_overlap() {
    let ring = Ring::new(&[
        Vector2::new(466_800.0, 658_100.0),
        Vector2::new(467_050.0, 658_120.0),
        Vector2::new(467_000.0, 658_330.0),
        Vector2::new(466_900.0, 658_250.0),
        Vector2::new(466_820.0, 658_300.0),
    ])
    .unwrap();
    let layout = HexLayout::new(ring.bbox().0, 25.0).unwrap();
    let cover: HashSet<Axial> = layout.covering(&ring).into_iter().collect();
    let (min, max) = ring.bbox();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5_000 {
        let p = Vector2::new(rng.gen_range(min.x..max.x), rng.gen_range(min.y..max.y));
        if !ring.contains(p) {
            continue;
        }
        let a = layout.locate(p);
        assert!(cover.contains(&a), "uncovered point {p:?}");
        assert!(layout.contains_eps(a, p, 1e-9));
        // No neighbour strictly contains the point as well.
        let strict = a
            .neighbors()
            .iter()
            .filter(|n| layout.contains_eps(**n, p, -1e-6))
            .count();
        assert_eq!(strict, 0);
    }
    // Area of all cells at least the ring area.
    let hex_area = 3f64.sqrt() / 2.0 * 25.0 * 25.0;
    assert!(cover.len() as f64 * hex_area >= ring.area());
}

#[test]
fn one_representative_per_cell_with_smallest_diff() {
    let ring = square(0.0, 0.0, 100.0);
    let layout = HexLayout::new(Vector2::new(0.0, 0.0), 25.0).unwrap();
    let c = layout.center(Axial::new(1, 1));
    let rows = vec![
        row("far", c.x + 5.0, c.y, Some(0.02), Verdict::Within),
        row("near", c.x + 1.0, c.y, Some(0.05), Verdict::Within),
        row("bad", c.x, c.y, Some(0.01), Verdict::Exceeded),
        row("undet", c.x - 1.0, c.y, None, Verdict::Undetermined),
    ];
    let sel = thin(&rows, &ring, &GridCfg::default()).unwrap();
    assert_eq!(sel.points.len(), 1);
    let p = &sel.points[0];
    assert_eq!(p.source_id, "far");
    assert_eq!(p.grid_id, "s_1");
    assert_eq!(p.cell, Axial::new(1, 1));
    assert_eq!(p.origin, Origin::GridCandidate);
    assert_eq!(p.row, 0);
    assert!(sel.points.len() <= sel.cells.len());

    let nearest = GridCfg {
        policy: RepresentativePolicy::NearestCenter,
        ..GridCfg::default()
    };
    let sel = thin(&rows, &ring, &nearest).unwrap();
    assert_eq!(sel.points[0].source_id, "near");
}

#[test]
fn equal_candidates_fall_back_to_id() {
    let ring = square(0.0, 0.0, 60.0);
    let layout = HexLayout::new(Vector2::new(0.0, 0.0), 25.0).unwrap();
    let c = layout.center(Axial::new(0, 1));
    let rows = vec![
        row("b", c.x + 2.0, c.y, Some(0.1), Verdict::Within),
        row("a", c.x - 2.0, c.y, Some(-0.1), Verdict::Within),
    ];
    let sel = thin(&rows, &ring, &GridCfg::default()).unwrap();
    assert_eq!(sel.points[0].source_id, "a");
}

#[test]
fn points_outside_covering_cells_are_ignored() {
    let ring = square(0.0, 0.0, 50.0);
    let rows = vec![row("x", 10_000.0, 10_000.0, Some(0.0), Verdict::Within)];
    let sel = thin(&rows, &ring, &GridCfg::default()).unwrap();
    assert!(sel.points.is_empty());
    assert_eq!(sel.empty_cells(), sel.cells.len());
}
