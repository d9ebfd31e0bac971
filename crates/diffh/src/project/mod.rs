//! Projection dispatch: PL-2000 zone systems → canonical PL-1992.
//!
//! Purpose
//! - Group classified points by zone, cut each group into batches, hand every
//!   batch to the `Geodesy` collaborator, and put the results back in input
//!   order. The projection formulas themselves live in the collaborator.
//!
//! Paths
//! - Accelerated: the batch is split into chunks transformed data-parallel on
//!   the `Accelerator`'s rayon pool.
//! - Sequential: one collaborator call for the whole batch.
//! - The first accelerated failure switches the dispatcher to the sequential
//!   path for that batch and every later batch of the run. A sequential
//!   failure is fatal.
//!
//! Accelerator detection happens once per process (the caller caches it) and
//! the result is passed in at construction.

mod accel;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use nalgebra::Vector2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProjectionError;
use crate::point::{CanonicalSystem, Point, Zone};

pub use accel::Accelerator;

/// Collaborator failure for one transform call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct GeodesyError(pub String);

/// Standards-compliant coordinate transform, addressed by system identifiers.
///
/// Input and output pairs are `(easting, northing)`; the output has the same
/// length and order as the input.
pub trait Geodesy: Sync {
    fn transform(
        &self,
        source: Zone,
        target: CanonicalSystem,
        coords: &[Vector2<f64>],
    ) -> Result<Vec<Vector2<f64>>, GeodesyError>;
}

/// Batching options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectCfg {
    pub target: CanonicalSystem,
    /// Points per dispatched batch.
    pub batch_size: usize,
    /// Points per data-parallel chunk on the accelerated path.
    pub chunk_size: usize,
}

impl Default for ProjectCfg {
    fn default() -> Self {
        Self {
            target: CanonicalSystem::Pl1992,
            batch_size: 10_000,
            chunk_size: 512,
        }
    }
}

/// Which path served the run, for the summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectionReport {
    pub batches: usize,
    pub accelerated_batches: usize,
    pub fell_back: bool,
}

/// Batch dispatcher over a geodesy collaborator.
pub struct Dispatcher<'g, G: Geodesy + ?Sized> {
    geodesy: &'g G,
    accel: Accelerator,
    cfg: ProjectCfg,
    fallen_back: AtomicBool,
    batches: AtomicUsize,
    accelerated: AtomicUsize,
}

impl<'g, G: Geodesy + ?Sized> Dispatcher<'g, G> {
    pub fn new(geodesy: &'g G, accel: Accelerator, cfg: ProjectCfg) -> Self {
        Self {
            geodesy,
            accel,
            cfg: ProjectCfg {
                batch_size: cfg.batch_size.max(1),
                chunk_size: cfg.chunk_size.max(1),
                ..cfg
            },
            fallen_back: AtomicBool::new(false),
            batches: AtomicUsize::new(0),
            accelerated: AtomicUsize::new(0),
        }
    }

    /// Counters accumulated over every call on this dispatcher.
    pub fn report(&self) -> ProjectionReport {
        ProjectionReport {
            batches: self.batches.load(Ordering::Relaxed),
            accelerated_batches: self.accelerated.load(Ordering::Relaxed),
            fell_back: self.fallen_back.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn accelerated_path(&self) -> bool {
        self.accel.is_available() && !self.fallen_back.load(Ordering::Relaxed)
    }

    /// Fill `canon` for every point. Either all points are projected or an
    /// error is returned and no point is touched.
    pub fn project_points(&self, points: &mut [Point]) -> Result<(), ProjectionError> {
        let items: Vec<(Zone, Vector2<f64>)> =
            points.iter().map(|p| (p.zone, p.source_xy())).collect();
        let out = self.project_pairs(&items)?;
        for (p, c) in points.iter_mut().zip(out) {
            p.canon = Some(c);
        }
        Ok(())
    }

    /// Project `(zone, (easting, northing))` items; output follows input order.
    pub fn project_pairs(
        &self,
        items: &[(Zone, Vector2<f64>)],
    ) -> Result<Vec<Vector2<f64>>, ProjectionError> {
        let mut by_zone: BTreeMap<Zone, Vec<usize>> = BTreeMap::new();
        for (i, (zone, _)) in items.iter().enumerate() {
            by_zone.entry(*zone).or_default().push(i);
        }
        let mut out: Vec<Option<Vector2<f64>>> = vec![None; items.len()];
        for (zone, indices) in by_zone {
            for idx_batch in indices.chunks(self.cfg.batch_size) {
                let coords: Vec<Vector2<f64>> = idx_batch.iter().map(|&i| items[i].1).collect();
                let batch = self.batches.fetch_add(1, Ordering::Relaxed);
                let projected = self.run_batch(zone, batch, &coords)?;
                for (&i, c) in idx_batch.iter().zip(projected) {
                    out[i] = Some(c);
                }
            }
        }
        out.into_iter()
            .map(|c| {
                c.ok_or(ProjectionError::LengthMismatch {
                    expected: items.len(),
                    got: 0,
                })
            })
            .collect()
    }

    fn run_batch(
        &self,
        zone: Zone,
        batch: usize,
        coords: &[Vector2<f64>],
    ) -> Result<Vec<Vector2<f64>>, ProjectionError> {
        if self.accelerated_path() {
            match self.run_parallel(zone, coords) {
                Ok(v) => {
                    self.accelerated.fetch_add(1, Ordering::Relaxed);
                    debug!(%zone, batch, points = coords.len(), "projected batch (accelerated)");
                    return Ok(v);
                }
                Err(e) => {
                    warn!(%zone, batch, error = %e, "accelerated projection failed; sequential path for the rest of the run");
                    self.fallen_back.store(true, Ordering::Relaxed);
                }
            }
        }
        let v = self
            .geodesy
            .transform(zone, self.cfg.target, coords)
            .map_err(|e| ProjectionError::Transform {
                zone,
                batch,
                message: e.0,
            })?;
        check_len(coords.len(), &v)?;
        debug!(%zone, batch, points = coords.len(), "projected batch (sequential)");
        Ok(v)
    }

    fn run_parallel(
        &self,
        zone: Zone,
        coords: &[Vector2<f64>],
    ) -> Result<Vec<Vector2<f64>>, GeodesyError> {
        let Some(pool) = self.accel.pool() else {
            return Err(GeodesyError("accelerator pool unavailable".into()));
        };
        let target = self.cfg.target;
        let chunks: Vec<Vec<Vector2<f64>>> = pool.install(|| {
            coords
                .par_chunks(self.cfg.chunk_size)
                .map(|chunk| {
                    let v = self.geodesy.transform(zone, target, chunk)?;
                    if v.len() != chunk.len() {
                        return Err(GeodesyError(format!(
                            "chunk of {} returned {} points",
                            chunk.len(),
                            v.len()
                        )));
                    }
                    Ok(v)
                })
                .collect::<Result<Vec<_>, GeodesyError>>()
        })?;
        Ok(chunks.into_iter().flatten().collect())
    }
}

fn check_len(expected: usize, got: &[Vector2<f64>]) -> Result<(), ProjectionError> {
    if got.len() != expected {
        return Err(ProjectionError::LengthMismatch {
            expected,
            got: got.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
