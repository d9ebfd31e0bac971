//! Hex grid thinner: one representative accurate point per hexagonal cell.
//!
//! Purpose
//! - Reduce the accurate subset of an evaluation to a sparse, evenly spread
//!   set: tile the boundary's bounding box with hexagons of the requested
//!   spacing, keep cells whose area meets the boundary, and pick at most one
//!   candidate per cell.
//!
//! Model
//! - Tiling origin is the boundary's bounding-box minimum.
//! - A candidate belongs to the single cell `HexLayout::locate` assigns it;
//!   points on a shared edge therefore land in exactly one cell.
//! - Only rows with a `Within` verdict compete. Selection key under
//!   `SmallestDiff`: `(|driving diff|, distance to centre, id)`; under
//!   `NearestCenter`: `(distance to centre, |driving diff|, id)`.
//! - Cells without candidates contribute nothing.

mod hex;
mod ring;

use std::cmp::Ordering;
use std::collections::HashMap;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GridError;
use crate::evaluate::{DiffKind, Evaluated, Verdict};
use crate::point::Origin;

pub use hex::{Axial, HexLayout};
pub use ring::{segments_intersect, Ring, EDGE_EPS};

/// Which candidate represents a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentativePolicy {
    #[default]
    SmallestDiff,
    NearestCenter,
}

/// Grid options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridCfg {
    /// Distance between neighbouring cell centres in metres.
    pub spacing: f64,
    /// Prefix of generated grid point ids; a 1-based counter is appended.
    pub id_prefix: String,
    pub policy: RepresentativePolicy,
    /// Run a separate elevation pass over the selected points.
    pub enrich: bool,
}

impl Default for GridCfg {
    fn default() -> Self {
        Self {
            spacing: 25.0,
            id_prefix: "s_".to_string(),
            policy: RepresentativePolicy::SmallestDiff,
            enrich: false,
        }
    }
}

/// Selected representative of one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct GridPoint {
    pub grid_id: String,
    /// Index into the evaluated rows the selection was made from.
    pub row: usize,
    pub source_id: String,
    /// Canonical `(easting, northing)`.
    pub canon: Vector2<f64>,
    pub h: Option<f64>,
    pub service_h: Option<f64>,
    pub diff_used: Option<DiffKind>,
    pub abs_diff: f64,
    pub cell: Axial,
    pub center_distance: f64,
    pub origin: Origin,
}

/// Per-cell bookkeeping for the summary.
#[derive(Clone, Debug, PartialEq)]
pub struct GridCell {
    pub axial: Axial,
    pub center: Vector2<f64>,
    pub candidates: usize,
    /// Index into `GridSelection::points`.
    pub selected: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct GridSelection {
    /// Every covering cell in `(r, q)` order.
    pub cells: Vec<GridCell>,
    pub points: Vec<GridPoint>,
}

impl GridSelection {
    pub fn empty_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.selected.is_none()).count()
    }
}

struct Candidate<'a> {
    row: usize,
    eval: &'a Evaluated,
    abs_diff: f64,
    center_distance: f64,
}

fn compare(policy: RepresentativePolicy, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    let by_diff = a.abs_diff.total_cmp(&b.abs_diff);
    let by_center = a.center_distance.total_cmp(&b.center_distance);
    let primary = match policy {
        RepresentativePolicy::SmallestDiff => by_diff.then(by_center),
        RepresentativePolicy::NearestCenter => by_center.then(by_diff),
    };
    primary.then_with(|| a.eval.id.cmp(&b.eval.id))
}

/// Thin accurate rows over a canonical boundary ring.
pub fn thin(rows: &[Evaluated], ring: &Ring, cfg: &GridCfg) -> Result<GridSelection, GridError> {
    let (origin, _) = ring.bbox();
    let layout = HexLayout::new(origin, cfg.spacing)?;
    let covering = layout.covering(ring);
    let slot: HashMap<Axial, usize> = covering.iter().enumerate().map(|(i, a)| (*a, i)).collect();

    let mut buckets: Vec<Vec<Candidate<'_>>> = (0..covering.len()).map(|_| Vec::new()).collect();
    for (row, eval) in rows.iter().enumerate() {
        if eval.verdict.verdict != Verdict::Within {
            continue;
        }
        let Some(d) = eval.driving_diff() else {
            continue;
        };
        let cell = layout.locate(eval.canon);
        if let Some(&k) = slot.get(&cell) {
            buckets[k].push(Candidate {
                row,
                eval,
                abs_diff: d.abs(),
                center_distance: (eval.canon - layout.center(cell)).norm(),
            });
        }
    }

    let mut sel = GridSelection::default();
    for (axial, bucket) in covering.iter().zip(&buckets) {
        let best = bucket.iter().min_by(|a, b| compare(cfg.policy, a, b));
        let selected = best.map(|c| {
            sel.points.push(GridPoint {
                grid_id: format!("{}{}", cfg.id_prefix, sel.points.len() + 1),
                row: c.row,
                source_id: c.eval.id.clone(),
                canon: c.eval.canon,
                h: c.eval.h,
                service_h: c.eval.service_h,
                diff_used: c.eval.verdict.diff_used,
                abs_diff: c.abs_diff,
                cell: *axial,
                center_distance: c.center_distance,
                origin: Origin::GridCandidate,
            });
            sel.points.len() - 1
        });
        if let Some(c) = best {
            debug!(q = axial.q, r = axial.r, candidates = bucket.len(), chosen = %c.eval.id, "cell representative");
        }
        sel.cells.push(GridCell {
            axial: *axial,
            center: layout.center(*axial),
            candidates: bucket.len(),
            selected,
        });
    }
    info!(
        cells = sel.cells.len(),
        selected = sel.points.len(),
        empty = sel.empty_cells(),
        spacing = cfg.spacing,
        "grid thinning finished"
    );
    Ok(sel)
}

#[cfg(test)]
mod tests;
