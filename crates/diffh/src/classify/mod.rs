//! Coordinate classification: axis order and PL-2000 zone of a raw dataset.
//!
//! Model
//! - PL-2000 eastings carry the zone in their leading digit: a 7-digit value
//!   starting with 5/6/7/8 lies in zone 5/6/7/8. Northings in Poland are also
//!   7-digit numbers starting with 5 or 6, so a single row can be ambiguous.
//! - Each row votes: exactly one column in an easting band decides the axis
//!   order; both in band abstains; neither is an error.
//! - The dataset order is the common vote of deciding rows. With no deciding
//!   row the Polish geodetic order (first column = northing) applies.
//! - A manual override skips the vote for the whole dataset.
//!
//! Raw values are parsed (decimal comma accepted) but never altered beyond
//! the optional input rounding.

mod parse;

use std::collections::HashMap;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ClassificationError;
use crate::point::{AxisConvention, Origin, Point, RawRecord, Zone};
use crate::rounding::round_half_even;

pub use parse::parse_number;

/// Classification options for one dataset kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyCfg {
    /// Manual axis order for the input set (skips the heuristic).
    pub input_axis: Option<AxisConvention>,
    /// Manual axis order for the reference set.
    pub reference_axis: Option<AxisConvention>,
    /// Manual axis order for the boundary ring.
    pub boundary_axis: Option<AxisConvention>,
    /// Prefix for ids of records without one; the 1-based row is appended.
    pub id_prefix: String,
    /// Round raw x/y/h (half to even) to this many decimals when reading.
    pub round_input: Option<u32>,
}

impl Default for ClassifyCfg {
    fn default() -> Self {
        Self {
            input_axis: None,
            reference_axis: None,
            boundary_axis: None,
            id_prefix: "P_".to_string(),
            round_input: None,
        }
    }
}

impl ClassifyCfg {
    /// Override for the given dataset origin.
    pub fn axis_override(&self, origin: Origin) -> Option<AxisConvention> {
        match origin {
            Origin::Input => self.input_axis,
            Origin::Reference => self.reference_axis,
            Origin::GridCandidate => None,
        }
    }
}

/// Axis order and zone detected for a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detection {
    pub axis: AxisConvention,
    pub zone: Zone,
    /// Rows where both columns fell in an easting band.
    pub ambiguous_rows: usize,
    /// True when no row decided and the default order was applied.
    pub defaulted: bool,
}

/// A classified point dataset.
#[derive(Clone, Debug)]
pub struct Classified {
    pub points: Vec<Point>,
    pub detection: Detection,
}

/// A classified boundary ring, still in source coordinates.
#[derive(Clone, Debug)]
pub struct ClassifiedBoundary {
    /// Source-system `(easting, northing)` per vertex, in ring order.
    pub vertices: Vec<Vector2<f64>>,
    pub detection: Detection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Vote {
    Decided(AxisConvention),
    Ambiguous,
    Neither,
}

fn vote(first: f64, second: f64) -> Vote {
    match (Zone::from_easting(first), Zone::from_easting(second)) {
        (Some(_), Some(_)) => Vote::Ambiguous,
        (None, Some(_)) => Vote::Decided(AxisConvention::NorthingFirst),
        (Some(_), None) => Vote::Decided(AxisConvention::EastingFirst),
        (None, None) => Vote::Neither,
    }
}

/// Detect axis order and zone from `(first, second)` coordinate pairs.
///
/// Rows are reported 1-based in errors.
pub fn detect(
    coords: &[(f64, f64)],
    axis_override: Option<AxisConvention>,
) -> Result<Detection, ClassificationError> {
    if coords.is_empty() {
        return Err(ClassificationError::Empty);
    }
    let mut ambiguous_rows = 0usize;
    let mut defaulted = false;
    let axis = match axis_override {
        Some(axis) => axis,
        None => {
            let mut decided: Option<(AxisConvention, usize)> = None;
            for (i, &(first, second)) in coords.iter().enumerate() {
                let row = i + 1;
                match vote(first, second) {
                    Vote::Decided(axis) => match decided {
                        None => decided = Some((axis, row)),
                        Some((established, by)) if established != axis => {
                            return Err(ClassificationError::InconsistentAxis {
                                row,
                                established_by: by,
                            });
                        }
                        Some(_) => {}
                    },
                    Vote::Ambiguous => ambiguous_rows += 1,
                    Vote::Neither => {
                        return Err(ClassificationError::NoZone { row, first, second });
                    }
                }
            }
            match decided {
                Some((axis, _)) => axis,
                None => {
                    defaulted = true;
                    AxisConvention::NorthingFirst
                }
            }
        }
    };

    let mut zone: Option<Zone> = None;
    for (i, &(first, second)) in coords.iter().enumerate() {
        let row = i + 1;
        let (_, easting) = axis.northing_easting(first, second);
        let found =
            Zone::from_easting(easting).ok_or(ClassificationError::NoZone { row, first, second })?;
        match zone {
            None => zone = Some(found),
            Some(expected) if expected != found => {
                return Err(ClassificationError::InconsistentZone {
                    row,
                    found,
                    expected,
                });
            }
            Some(_) => {}
        }
    }
    let zone = zone.ok_or(ClassificationError::Empty)?;
    if defaulted {
        info!(
            rows = coords.len(),
            "axis order ambiguous on every row; assuming northing first"
        );
    }
    Ok(Detection {
        axis,
        zone,
        ambiguous_rows,
        defaulted,
    })
}

/// Ids are unique within a dataset, generated ones included.
fn check_unique_ids(points: &[Point]) -> Result<(), ClassificationError> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if let Some(&first_row) = seen.get(p.id.as_str()) {
            return Err(ClassificationError::DuplicateId {
                row: i + 1,
                id: p.id.clone(),
                first_row,
            });
        }
        seen.insert(&p.id, i + 1);
    }
    Ok(())
}

/// Parse, tag and build the points of one dataset.
pub fn classify(
    records: &[RawRecord],
    origin: Origin,
    cfg: &ClassifyCfg,
) -> Result<Classified, ClassificationError> {
    let coords = parse_coords(records, cfg.round_input)?;
    let detection = detect(&coords, cfg.axis_override(origin))?;
    let points = records
        .iter()
        .zip(&coords)
        .enumerate()
        .map(|(i, (rec, &(x, y)))| {
            let h = rec
                .h
                .as_deref()
                .and_then(parse_number)
                .map(|h| maybe_round(h, cfg.round_input));
            Point {
                id: rec
                    .id
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}{}", cfg.id_prefix, i + 1)),
                x_raw: x,
                y_raw: y,
                axis: detection.axis,
                zone: detection.zone,
                canon: None,
                h,
                origin,
            }
        })
        .collect::<Vec<_>>();
    check_unique_ids(&points)?;
    debug!(
        ?origin,
        axis = ?detection.axis,
        zone = %detection.zone,
        ambiguous = detection.ambiguous_rows,
        "classified dataset"
    );
    Ok(Classified { points, detection })
}

/// Parse and tag a boundary ring; heights and ids are ignored.
pub fn classify_boundary(
    records: &[RawRecord],
    cfg: &ClassifyCfg,
) -> Result<ClassifiedBoundary, ClassificationError> {
    let coords = parse_coords(records, cfg.round_input)?;
    let detection = detect(&coords, cfg.boundary_axis)?;
    let vertices = coords
        .iter()
        .map(|&(first, second)| {
            let (n, e) = detection.axis.northing_easting(first, second);
            Vector2::new(e, n)
        })
        .collect();
    debug!(axis = ?detection.axis, zone = %detection.zone, "classified boundary");
    Ok(ClassifiedBoundary {
        vertices,
        detection,
    })
}

fn parse_coords(
    records: &[RawRecord],
    round: Option<u32>,
) -> Result<Vec<(f64, f64)>, ClassificationError> {
    records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let row = i + 1;
            let x = parse_number(&rec.x).ok_or_else(|| ClassificationError::NonNumeric {
                row,
                column: "x",
                value: rec.x.clone(),
            })?;
            let y = parse_number(&rec.y).ok_or_else(|| ClassificationError::NonNumeric {
                row,
                column: "y",
                value: rec.y.clone(),
            })?;
            Ok((maybe_round(x, round), maybe_round(y, round)))
        })
        .collect()
}

#[inline]
fn maybe_round(v: f64, decimals: Option<u32>) -> f64 {
    match decimals {
        Some(d) => round_half_even(v, d),
        None => v,
    }
}

#[cfg(test)]
mod tests;
