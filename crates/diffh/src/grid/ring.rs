//! Simple polygon ring in canonical coordinates.

use nalgebra::Vector2;

use crate::error::GridError;

/// Closed ring; the closing vertex is implicit. Vertices are stored relative
/// to `anchor` to keep products small at national-grid magnitudes.
#[derive(Clone, Debug)]
pub struct Ring {
    anchor: Vector2<f64>,
    rel: Vec<Vector2<f64>>,
    min: Vector2<f64>,
    max: Vector2<f64>,
}

/// Slack in metres for on-edge tests.
pub const EDGE_EPS: f64 = 1e-7;

impl Ring {
    /// Drops consecutive duplicates and an explicit closing vertex; rejects
    /// rings with fewer than 3 vertices or zero area.
    pub fn new(vertices: &[Vector2<f64>]) -> Result<Self, GridError> {
        let mut v: Vec<Vector2<f64>> = Vec::with_capacity(vertices.len());
        for p in vertices {
            if v.last() != Some(p) {
                v.push(*p);
            }
        }
        if v.len() > 1 && v.first() == v.last() {
            v.pop();
        }
        if v.len() < 3 || v.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(GridError::DegenerateBoundary(v.len()));
        }
        let anchor = v[0];
        let rel: Vec<Vector2<f64>> = v.iter().map(|p| p - anchor).collect();
        let mut min = v[0];
        let mut max = v[0];
        for p in &v {
            min = min.inf(p);
            max = max.sup(p);
        }
        let ring = Self {
            anchor,
            rel,
            min,
            max,
        };
        if ring.area() <= EDGE_EPS {
            return Err(GridError::DegenerateBoundary(ring.rel.len()));
        }
        Ok(ring)
    }

    pub fn len(&self) -> usize {
        self.rel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rel.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vector2<f64>> + '_ {
        self.rel.iter().map(move |p| p + self.anchor)
    }

    /// Axis-aligned bounding box `(min, max)`.
    pub fn bbox(&self) -> (Vector2<f64>, Vector2<f64>) {
        (self.min, self.max)
    }

    /// Unsigned shoelace area.
    pub fn area(&self) -> f64 {
        let n = self.rel.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.rel[i];
                let b = self.rel[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice.abs() / 2.0
    }

    /// Edges as absolute `(start, end)` pairs, closing edge included.
    pub fn edges(&self) -> impl Iterator<Item = (Vector2<f64>, Vector2<f64>)> + '_ {
        let n = self.rel.len();
        (0..n).map(move |i| (self.rel[i] + self.anchor, self.rel[(i + 1) % n] + self.anchor))
    }

    /// Even-odd containment; points on an edge count as inside.
    pub fn contains(&self, p: Vector2<f64>) -> bool {
        if p.x < self.min.x - EDGE_EPS
            || p.x > self.max.x + EDGE_EPS
            || p.y < self.min.y - EDGE_EPS
            || p.y > self.max.y + EDGE_EPS
        {
            return false;
        }
        let q = p - self.anchor;
        let n = self.rel.len();
        let mut inside = false;
        for i in 0..n {
            let a = self.rel[i];
            let b = self.rel[(i + 1) % n];
            if on_segment(q, a, b) {
                return true;
            }
            if (a.y > q.y) != (b.y > q.y) {
                let x = a.x + (q.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if q.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

#[inline]
fn cross(o: Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    (a - o).perp(&(b - o))
}

fn on_segment(p: Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>) -> bool {
    let len = (b - a).norm();
    if len == 0.0 {
        return (p - a).norm() <= EDGE_EPS;
    }
    if (cross(a, b, p) / len).abs() > EDGE_EPS {
        return false;
    }
    let t = (p - a).dot(&(b - a)) / (len * len);
    t >= -EDGE_EPS / len && t <= 1.0 + EDGE_EPS / len
}

/// Closed segments `ab` and `cd` share at least one point.
pub fn segments_intersect(
    a: Vector2<f64>,
    b: Vector2<f64>,
    c: Vector2<f64>,
    d: Vector2<f64>,
) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    on_segment(a, c, d) || on_segment(b, c, d) || on_segment(c, a, b) || on_segment(d, a, b)
}
