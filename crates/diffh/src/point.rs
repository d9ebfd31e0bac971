//! Survey points and the tags they collect during a run.
//!
//! - `RawRecord`: one row as supplied by the input collaborator (strings).
//! - `Point`: a classified row; `canon` is filled by the projection dispatcher.
//! - `Zone`, `AxisConvention`, `Origin`, `CanonicalSystem`: small tags.

use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;

/// Order of the two coordinate columns in a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisConvention {
    /// First column is the northing (Polish geodetic X), second the easting.
    NorthingFirst,
    /// First column is the easting, second the northing.
    EastingFirst,
}

impl AxisConvention {
    /// Split a raw `(first, second)` pair into `(northing, easting)`.
    #[inline]
    pub fn northing_easting(self, first: f64, second: f64) -> (f64, f64) {
        match self {
            AxisConvention::NorthingFirst => (first, second),
            AxisConvention::EastingFirst => (second, first),
        }
    }
}

/// PL-2000 zone. The zone digit is the leading digit of the 7-digit easting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    Z5,
    Z6,
    Z7,
    Z8,
}

impl Zone {
    pub const ALL: [Zone; 4] = [Zone::Z5, Zone::Z6, Zone::Z7, Zone::Z8];

    #[inline]
    pub fn from_digit(d: i64) -> Option<Zone> {
        match d {
            5 => Some(Zone::Z5),
            6 => Some(Zone::Z6),
            7 => Some(Zone::Z7),
            8 => Some(Zone::Z8),
            _ => None,
        }
    }

    /// Zone whose easting band (`d·10⁶ ..< (d+1)·10⁶`) contains `easting`.
    pub fn from_easting(easting: f64) -> Option<Zone> {
        if !easting.is_finite() || easting < 1_000_000.0 || easting >= 10_000_000.0 {
            return None;
        }
        Zone::from_digit((easting.trunc() as i64) / 1_000_000)
    }

    #[inline]
    pub fn digit(self) -> u8 {
        match self {
            Zone::Z5 => 5,
            Zone::Z6 => 6,
            Zone::Z7 => 7,
            Zone::Z8 => 8,
        }
    }

    #[inline]
    pub fn epsg(self) -> u32 {
        2171 + self.digit() as u32
    }

    /// Central meridian in degrees (15°, 18°, 21°, 24°).
    #[inline]
    pub fn central_meridian(self) -> f64 {
        3.0 * self.digit() as f64
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PL-2000/{} (EPSG:{})", self.digit(), self.epsg())
    }
}

/// Target plane system all points are normalized to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalSystem {
    #[default]
    Pl1992,
}

impl CanonicalSystem {
    #[inline]
    pub fn epsg(self) -> u32 {
        match self {
            CanonicalSystem::Pl1992 => 2180,
        }
    }
}

/// Which dataset a point belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Input,
    Reference,
    GridCandidate,
}

/// One row from the input collaborator, before classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub id: Option<String>,
    pub x: String,
    pub y: String,
    pub h: Option<String>,
}

impl RawRecord {
    pub fn new(id: Option<&str>, x: &str, y: &str, h: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            x: x.to_string(),
            y: y.to_string(),
            h: h.map(str::to_string),
        }
    }
}

/// A classified survey point.
///
/// Invariants:
/// - `id` is unique within its dataset (not globally).
/// - `canon` is `Some` once the projection dispatcher has run; it holds
///   PL-1992 `(easting, northing)` in geodesy-library axis order.
/// - `x_raw`/`y_raw` are never mutated after classification.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: String,
    pub x_raw: f64,
    pub y_raw: f64,
    pub axis: AxisConvention,
    pub zone: Zone,
    pub canon: Option<Vector2<f64>>,
    pub h: Option<f64>,
    pub origin: Origin,
}

impl Point {
    /// Source-system `(easting, northing)` as the geodesy collaborator expects it.
    #[inline]
    pub fn source_xy(&self) -> Vector2<f64> {
        let (n, e) = self.axis.northing_easting(self.x_raw, self.y_raw);
        Vector2::new(e, n)
    }

    /// Canonical coordinates, or an error naming the point if projection has not run.
    #[inline]
    pub fn canonical(&self) -> Result<Vector2<f64>, ProjectionError> {
        self.canon.ok_or_else(|| ProjectionError::NotProjected {
            id: self.id.clone(),
        })
    }
}
