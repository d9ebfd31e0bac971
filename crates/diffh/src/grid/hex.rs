//! Pointy-top hexagonal tiling addressed by axial coordinates.
//!
//! - Neighbouring centres are `spacing` apart; circumradius `R = spacing/√3`,
//!   apothem `spacing/2`.
//! - `center(q, r) = origin + (spacing·(q + r/2), 1.5·R·r)`.
//! - A cell is the intersection of six closed half-planes `n·(p − c) ≤ a`
//!   with outward normals at 0°, 60°, …, 300°.
//! - `locate` maps every point to exactly one cell (cube rounding).

use std::f64::consts::PI;

use nalgebra::Vector2;
use serde::Serialize;

use super::ring::{segments_intersect, Ring, EDGE_EPS};
use crate::error::GridError;

/// Axial cell address. Ordered by row, then column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Axial {
    pub r: i64,
    pub q: i64,
}

impl Axial {
    pub fn new(q: i64, r: i64) -> Self {
        Self { r, q }
    }

    pub fn neighbors(self) -> [Axial; 6] {
        let Axial { q, r } = self;
        [
            Axial::new(q + 1, r),
            Axial::new(q + 1, r - 1),
            Axial::new(q, r - 1),
            Axial::new(q - 1, r),
            Axial::new(q - 1, r + 1),
            Axial::new(q, r + 1),
        ]
    }
}

/// Closed half-plane `n · x ≤ c` relative to a cell centre.
#[derive(Clone, Copy, Debug)]
struct HalfPlane {
    n: Vector2<f64>,
    c: f64,
}

impl HalfPlane {
    #[inline]
    fn satisfies_eps(&self, p: Vector2<f64>, eps: f64) -> bool {
        self.n.dot(&p) <= self.c + eps
    }
}

/// Tiling geometry.
#[derive(Clone, Debug)]
pub struct HexLayout {
    origin: Vector2<f64>,
    spacing: f64,
    planes: [HalfPlane; 6],
    corners: [Vector2<f64>; 6],
}

impl HexLayout {
    pub fn new(origin: Vector2<f64>, spacing: f64) -> Result<Self, GridError> {
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(GridError::InvalidSpacing(spacing));
        }
        let radius = spacing / 3f64.sqrt();
        let apothem = spacing / 2.0;
        let planes = std::array::from_fn(|i| {
            let a = PI / 3.0 * i as f64;
            HalfPlane {
                n: Vector2::new(a.cos(), a.sin()),
                c: apothem,
            }
        });
        let corners = std::array::from_fn(|i| {
            let a = PI / 3.0 * i as f64 + PI / 6.0;
            Vector2::new(radius * a.cos(), radius * a.sin())
        });
        Ok(Self {
            origin,
            spacing,
            planes,
            corners,
        })
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn circumradius(&self) -> f64 {
        self.spacing / 3f64.sqrt()
    }

    #[inline]
    fn row_height(&self) -> f64 {
        1.5 * self.circumradius()
    }

    pub fn center(&self, a: Axial) -> Vector2<f64> {
        self.origin
            + Vector2::new(
                self.spacing * (a.q as f64 + a.r as f64 / 2.0),
                self.row_height() * a.r as f64,
            )
    }

    /// Corners in counter-clockwise order, absolute coordinates.
    pub fn corners(&self, a: Axial) -> [Vector2<f64>; 6] {
        let c = self.center(a);
        self.corners.map(|k| c + k)
    }

    /// `p` lies in cell `a` with slack `eps` (negative = strict interior).
    pub fn contains_eps(&self, a: Axial, p: Vector2<f64>, eps: f64) -> bool {
        let d = p - self.center(a);
        self.planes.iter().all(|h| h.satisfies_eps(d, eps))
    }

    /// Cell containing `p`.
    pub fn locate(&self, p: Vector2<f64>) -> Axial {
        let d = p - self.origin;
        let radius = self.circumradius();
        let qf = (3f64.sqrt() / 3.0 * d.x - d.y / 3.0) / radius;
        let rf = (2.0 / 3.0 * d.y) / radius;
        cube_round(qf, rf)
    }

    /// Cell area intersects the ring (centre, corner or vertex inside, or
    /// crossing edges).
    pub fn intersects(&self, a: Axial, ring: &Ring) -> bool {
        let c = self.center(a);
        let (min, max) = ring.bbox();
        let rad = self.circumradius();
        if c.x + rad < min.x || c.x - rad > max.x || c.y + rad < min.y || c.y - rad > max.y {
            return false;
        }
        if ring.contains(c) {
            return true;
        }
        let corners = self.corners(a);
        if corners.iter().any(|k| ring.contains(*k)) {
            return true;
        }
        if ring.vertices().any(|v| self.contains_eps(a, v, EDGE_EPS)) {
            return true;
        }
        ring.edges().any(|(p, q)| {
            (0..6).any(|i| segments_intersect(p, q, corners[i], corners[(i + 1) % 6]))
        })
    }

    /// Every cell whose area meets the ring, ordered by `(r, q)`.
    pub fn covering(&self, ring: &Ring) -> Vec<Axial> {
        let (min, max) = ring.bbox();
        let h = self.row_height();
        let r0 = ((min.y - self.origin.y) / h).floor() as i64 - 1;
        let r1 = ((max.y - self.origin.y) / h).ceil() as i64 + 1;
        let mut out = Vec::new();
        for r in r0..=r1 {
            let shift = r as f64 / 2.0;
            let q0 = ((min.x - self.origin.x) / self.spacing - shift).floor() as i64 - 1;
            let q1 = ((max.x - self.origin.x) / self.spacing - shift).ceil() as i64 + 1;
            for q in q0..=q1 {
                let a = Axial::new(q, r);
                if self.intersects(a, ring) {
                    out.push(a);
                }
            }
        }
        out
    }
}

fn cube_round(qf: f64, rf: f64) -> Axial {
    let sf = -qf - rf;
    let mut q = qf.round();
    let mut r = rf.round();
    let s = sf.round();
    let dq = (q - qf).abs();
    let dr = (r - rf).abs();
    let ds = (s - sf).abs();
    if dq > dr && dq > ds {
        q = -r - s;
    } else if dr > ds {
        r = -q - s;
    }
    Axial::new(q as i64, r as i64)
}
