//! Height reconciliation for PL-2000 survey point sets.
//!
//! Pipeline per run: classify raw coordinates (axis order, zone), reproject to
//! PL-1992, enrich with service heights and/or pair with a reference set,
//! evaluate height differences against tolerances, and optionally thin the
//! accurate points on a hexagonal grid.
//!
//! Collaborators that touch the outside world (projection arithmetic, the
//! elevation service, files) are traits; the `cli` crate wires real ones.
//!
//! API Policy
//! - This crate is project-internal. There is no stable public API.
//! - Prefer `api` re-exports from callers; module paths may move.

pub mod api;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod evaluate;
pub mod grid;
pub mod matching;
pub mod pipeline;
pub mod point;
pub mod project;
pub mod rounding;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::Config;
pub use error::{Error, Result};
pub use nalgebra::Vector2 as Vec2;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::classify::{classify, classify_boundary, ClassifyCfg};
    pub use crate::config::Config;
    pub use crate::enrich::{CoordKey, ElevationLookup, EnrichCfg, LookupError};
    pub use crate::error::{Error, Result};
    pub use crate::evaluate::{DiffKind, Evaluated, ToleranceCfg, Verdict};
    pub use crate::grid::{GridCfg, GridSelection};
    pub use crate::matching::{MatchCfg, MatchResult, MatchedPair};
    pub use crate::pipeline::{run, Collaborators, Mode, RunInput, RunOutput};
    pub use crate::point::{AxisConvention, CanonicalSystem, Origin, Point, RawRecord, Zone};
    pub use crate::project::{Accelerator, Geodesy, GeodesyError};
    pub use nalgebra::Vector2 as Vec2;
}
