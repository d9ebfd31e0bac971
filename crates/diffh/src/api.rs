//! Curated internal API (UNSTABLE).
//!
//! - Not a public API; a convenience surface for the `cli` crate, benches
//!   and integration tests. Breaking changes are allowed.

// Data model and configuration
pub use crate::config::{Config, MISSING_MARKER};
pub use crate::error::{
    ClassificationError, EnrichmentError, Error, GridError, ProjectionError, Result,
    ZoneMismatchError,
};
pub use crate::point::{AxisConvention, CanonicalSystem, Origin, Point, RawRecord, Zone};
pub use crate::rounding::{round_half_away, round_half_even, RoundingCfg};
// Stages
pub use crate::classify::{classify, classify_boundary, detect, parse_number, ClassifyCfg, Detection};
pub use crate::enrich::{
    batch_ranges, plan_keys, plan_site_keys, CoordKey, ElevationLookup, EnrichCfg, EnrichReport,
    EnrichmentClient, KeyCollision, LookupError, MAX_BATCH,
};
pub use crate::evaluate::{
    evaluate, partition, verdict, DiffKind, EvalInput, Evaluated, PairEval, Partition,
    ToleranceCfg, ToleranceVerdict, Verdict,
};
pub use crate::grid::{
    thin, Axial, GridCfg, GridCell, GridPoint, GridSelection, HexLayout, RepresentativePolicy, Ring,
};
pub use crate::matching::{
    match_points, MatchCfg, MatchResult, MatchedPair, MatchingAmbiguity, TieBreak,
};
pub use crate::project::{
    Accelerator, Dispatcher, Geodesy, GeodesyError, ProjectCfg, ProjectionReport,
};
// Driver
pub use crate::pipeline::{run, Collaborators, GridOutput, Mode, RunInput, RunOutput};
