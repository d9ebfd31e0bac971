//! One classify → project → enrich/match → evaluate → thin pass.
//!
//! Order of checks
//! - Configuration and mode prerequisites.
//! - Classification of every dataset, then the boundary zone check; both
//!   abort before any projection, lookup or grid work.
//! - Projection must succeed for every point and vertex.
//! - Enrichment and matching consume the same canonical set independently.
//!
//! The function returns everything an output writer needs; it never touches
//! files itself, so a fatal error leaves nothing behind.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classify::{classify, classify_boundary, Detection};
use crate::config::Config;
use crate::enrich::{ElevationLookup, EnrichReport, EnrichmentClient};
use crate::error::{Error, Result, ZoneMismatchError};
use crate::evaluate::{evaluate, EvalInput, Evaluated};
use crate::grid::{thin, GridSelection, Ring};
use crate::matching::{match_points, MatchResult};
use crate::point::{Origin, Point, RawRecord};
use crate::project::{Accelerator, Dispatcher, Geodesy, ProjectionReport};

/// Which height sources a run compares against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Reference file only.
    Compare,
    /// Elevation service only.
    Service,
    /// Both.
    Both,
}

impl Mode {
    pub fn uses_reference(self) -> bool {
        matches!(self, Mode::Compare | Mode::Both)
    }

    pub fn uses_service(self) -> bool {
        matches!(self, Mode::Service | Mode::Both)
    }
}

/// Raw datasets of one run.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunInput<'a> {
    pub input: &'a [RawRecord],
    pub reference: Option<&'a [RawRecord]>,
    pub boundary: Option<&'a [RawRecord]>,
}

/// External collaborators of one run.
#[derive(Clone)]
pub struct Collaborators<'a> {
    pub geodesy: &'a dyn Geodesy,
    pub elevation: Option<&'a dyn ElevationLookup>,
    pub accelerator: Accelerator,
}

/// Grid stage result.
#[derive(Clone, Debug)]
pub struct GridOutput {
    /// Canonical boundary vertices.
    pub boundary: Vec<Vector2<f64>>,
    pub selection: GridSelection,
    /// Separate elevation pass over the selected points, when requested.
    pub enrichment: Option<EnrichReport>,
}

#[derive(Clone, Debug)]
pub struct RunOutput {
    pub mode: Mode,
    pub input_detection: Detection,
    pub reference_detection: Option<Detection>,
    pub boundary_detection: Option<Detection>,
    pub input: Vec<Point>,
    pub reference: Vec<Point>,
    pub projection: ProjectionReport,
    pub enrichment: Option<EnrichReport>,
    pub matches: Option<MatchResult>,
    /// Evaluated input rows, ordered.
    pub rows: Vec<Evaluated>,
    pub grid: Option<GridOutput>,
}

/// Run the whole pipeline.
pub fn run(
    mode: Mode,
    input: RunInput<'_>,
    collab: &Collaborators<'_>,
    cfg: &Config,
) -> Result<RunOutput> {
    cfg.validate(mode)?;
    let reference_raw = match (mode.uses_reference(), input.reference) {
        (true, Some(r)) => Some(r),
        (true, None) => {
            return Err(Error::InvalidConfig(format!(
                "mode {mode:?} needs a reference dataset"
            )))
        }
        (false, _) => None,
    };
    let elevation = match (mode.uses_service() || cfg.grid.enrich, collab.elevation) {
        (true, Some(e)) => Some(e),
        (true, None) if mode.uses_service() => {
            return Err(Error::InvalidConfig(format!(
                "mode {mode:?} needs an elevation service"
            )))
        }
        _ => None,
    };

    // Classification, then the boundary zone check, before any other work.
    let classified = classify(input.input, Origin::Input, &cfg.classify)?;
    let reference = reference_raw
        .map(|r| classify(r, Origin::Reference, &cfg.classify))
        .transpose()?;
    let boundary = input
        .boundary
        .map(|b| classify_boundary(b, &cfg.classify))
        .transpose()?;
    if let Some(b) = &boundary {
        if b.detection.zone != classified.detection.zone {
            return Err(ZoneMismatchError {
                points: classified.detection.zone,
                boundary: b.detection.zone,
            }
            .into());
        }
    }
    info!(
        points = classified.points.len(),
        axis = ?classified.detection.axis,
        zone = %classified.detection.zone,
        "input classified"
    );
    if let Some(r) = &reference {
        info!(
            points = r.points.len(),
            axis = ?r.detection.axis,
            zone = %r.detection.zone,
            "reference classified"
        );
    }

    let dispatcher = Dispatcher::new(collab.geodesy, collab.accelerator.clone(), cfg.project);
    let mut input_points = classified.points;
    dispatcher.project_points(&mut input_points)?;
    let mut reference_points = match &reference {
        Some(r) => r.points.clone(),
        None => Vec::new(),
    };
    dispatcher.project_points(&mut reference_points)?;
    // Fail on a degenerate ring before any network or matching work.
    let boundary_ring = match &boundary {
        Some(b) if cfg.tolerance.any() => {
            let items: Vec<_> = b
                .vertices
                .iter()
                .map(|v| (b.detection.zone, *v))
                .collect();
            let vertices = dispatcher.project_pairs(&items)?;
            let ring = Ring::new(&vertices)?;
            Some((ring, vertices))
        }
        Some(_) => {
            info!("boundary given but no tolerance configured; grid thinning skipped");
            None
        }
        None => None,
    };

    let enrichment = match elevation.filter(|_| mode.uses_service()) {
        Some(lookup) => {
            let client = EnrichmentClient::new(lookup, cfg.enrich)?;
            Some(client.enrich(&input_points)?)
        }
        None => None,
    };
    let matches = if mode.uses_reference() {
        Some(match_points(&input_points, &reference_points, &cfg.matching)?)
    } else {
        None
    };

    let rows = evaluate(
        EvalInput {
            input: &input_points,
            reference: &reference_points,
            matches: matches.as_ref(),
            service: enrichment.as_ref().map(|e| e.heights.as_slice()),
        },
        &cfg.tolerance,
        &cfg.rounding,
    )?;

    let grid = match boundary_ring {
        Some((ring, vertices)) => {
            let mut selection = thin(&rows, &ring, &cfg.grid)?;
            let grid_enrichment = match elevation.filter(|_| cfg.grid.enrich) {
                Some(lookup) if !selection.points.is_empty() => {
                    let sites: Vec<_> = selection
                        .points
                        .iter()
                        .map(|g| (g.grid_id.as_str(), g.canon))
                        .collect();
                    let client = EnrichmentClient::new(lookup, cfg.enrich)?;
                    let report = client.enrich_at(&sites)?;
                    for (g, h) in selection.points.iter_mut().zip(&report.heights) {
                        if let Some(h) = h {
                            g.service_h = Some(cfg.rounding.coord(*h));
                        }
                    }
                    Some(report)
                }
                _ => None,
            };
            Some(GridOutput {
                boundary: vertices,
                selection,
                enrichment: grid_enrichment,
            })
        }
        None => None,
    };

    let projection = dispatcher.report();
    info!(
        rows = rows.len(),
        batches = projection.batches,
        accelerated = projection.accelerated_batches,
        fell_back = projection.fell_back,
        "run finished"
    );
    Ok(RunOutput {
        mode,
        input_detection: classified.detection,
        reference_detection: reference.as_ref().map(|r| r.detection),
        boundary_detection: boundary.as_ref().map(|b| b.detection),
        input: input_points,
        reference: reference_points,
        projection,
        enrichment,
        matches,
        rows,
        grid,
    })
}
