//! R-tree over canonical points with deterministic nearest-neighbour ties.

use nalgebra::Vector2;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// Distances closer than this (metres) count as equal.
pub const TIE_EPS: f64 = 1e-9;

/// How equidistant candidates are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lexicographically smallest point id, then dataset order.
    #[default]
    SmallestId,
    /// Earliest point in dataset order.
    FirstIndex,
}

/// A point stored in the tree together with its dataset index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedPoint {
    pub xy: [f64; 2],
    pub index: usize,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xy)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.xy[0] - point[0];
        let dy = self.xy[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Nearest candidate for one query.
#[derive(Clone, Debug, PartialEq)]
pub struct Nearest {
    pub index: usize,
    pub distance: f64,
    /// Other candidates at the same distance (empty when unique).
    pub tied: Vec<usize>,
}

/// Immutable index over one dataset.
pub struct PointIndex<'a> {
    tree: RTree<IndexedPoint>,
    ids: &'a [String],
}

impl<'a> PointIndex<'a> {
    /// `coords[i]` and `ids[i]` describe point `i` of the dataset.
    pub fn new(coords: &[Vector2<f64>], ids: &'a [String]) -> Self {
        let items: Vec<IndexedPoint> = coords
            .iter()
            .enumerate()
            .map(|(index, c)| IndexedPoint {
                xy: [c.x, c.y],
                index,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
            ids,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nearest point to `q`; equidistant candidates resolved by `tie`.
    pub fn nearest(&self, q: Vector2<f64>, tie: TieBreak) -> Option<Nearest> {
        let mut iter = self.tree.nearest_neighbor_iter_with_distance_2(&[q.x, q.y]);
        let (first, d2) = iter.next()?;
        let best = d2.sqrt();
        let mut candidates = vec![first.index];
        for (p, d2) in iter {
            if d2.sqrt() - best > TIE_EPS {
                break;
            }
            candidates.push(p.index);
        }
        match tie {
            TieBreak::SmallestId => {
                candidates.sort_by(|&a, &b| self.ids[a].cmp(&self.ids[b]).then(a.cmp(&b)))
            }
            TieBreak::FirstIndex => candidates.sort_unstable(),
        }
        let index = candidates.remove(0);
        Some(Nearest {
            index,
            distance: best,
            tied: candidates,
        })
    }
}
