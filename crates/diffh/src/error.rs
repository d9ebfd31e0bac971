//! Error taxonomy.
//!
//! Fatal conditions are `Error` variants. Data unavailability from the
//! elevation service is not an error: it surfaces as a `None` height plus an
//! entry in the enrichment report. Nearest-neighbour ties are resolved and
//! logged by the matcher.

use crate::point::Zone;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Any fatal condition of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    ZoneMismatch(#[from] ZoneMismatchError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    Grid(#[from] GridError),

    /// A configuration value outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Raw coordinates could not be read or tagged consistently.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassificationError {
    #[error("dataset is empty")]
    Empty,

    #[error("row {row}: column {column} is not numeric: {value:?}")]
    NonNumeric {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: no PL-2000 easting band matches ({first}, {second})")]
    NoZone { row: usize, first: f64, second: f64 },

    #[error("row {row}: axis order contradicts the order established by row {established_by}")]
    InconsistentAxis { row: usize, established_by: usize },

    #[error("row {row}: zone {found} differs from dataset zone {expected}")]
    InconsistentZone {
        row: usize,
        found: Zone,
        expected: Zone,
    },

    #[error("row {row}: id {id:?} already used by row {first_row}")]
    DuplicateId {
        row: usize,
        id: String,
        first_row: usize,
    },
}

/// Boundary polygon and point set are in different zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("zone mismatch: points are in {points}, boundary is in {boundary}")]
pub struct ZoneMismatchError {
    pub points: Zone,
    pub boundary: Zone,
}

/// Projection failed on the sequential path (after any accelerator fallback).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("projection of {zone} batch {batch} failed: {message}")]
    Transform {
        zone: Zone,
        batch: usize,
        message: String,
    },

    #[error("geodesy returned {got} points for a batch of {expected}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("point {id} has no canonical coordinates")]
    NotProjected { id: String },
}

/// Enrichment configuration problems. Never raised for missing data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnrichmentError {
    #[error("batch size {0} outside 1..=300")]
    InvalidBatchSize(usize),

    #[error("key precision {0} outside 0..=6 decimals")]
    InvalidPrecision(u32),

    #[error("retry attempts must be at least 1")]
    InvalidAttempts,

    #[error("elevation endpoint misconfigured: {0}")]
    Endpoint(String),
}

/// Hex grid inputs that cannot produce a tiling.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("grid spacing must be positive and finite, got {0}")]
    InvalidSpacing(f64),

    #[error("boundary ring needs at least 3 distinct vertices and non-zero area, got {0} vertices")]
    DegenerateBoundary(usize),
}
