//! Run configuration: one serde-friendly aggregate of the per-stage options.
//!
//! Every field has a default, so a partial JSON document is a valid config.

use serde::{Deserialize, Serialize};

use crate::classify::ClassifyCfg;
use crate::enrich::EnrichCfg;
use crate::error::{Error, Result};
use crate::evaluate::ToleranceCfg;
use crate::grid::GridCfg;
use crate::matching::MatchCfg;
use crate::pipeline::Mode;
use crate::project::ProjectCfg;
use crate::rounding::{RoundingCfg, MAX_DECIMALS};

/// Output sentinel for absent values.
pub const MISSING_MARKER: &str = "brak_danych";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classify: ClassifyCfg,
    pub project: ProjectCfg,
    pub enrich: EnrichCfg,
    pub matching: MatchCfg,
    pub tolerance: ToleranceCfg,
    pub rounding: RoundingCfg,
    pub grid: GridCfg,
    /// Printed in place of absent values by output writers.
    pub missing_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classify: ClassifyCfg::default(),
            project: ProjectCfg::default(),
            enrich: EnrichCfg::default(),
            matching: MatchCfg::default(),
            tolerance: ToleranceCfg::default(),
            rounding: RoundingCfg::default(),
            grid: GridCfg::default(),
            missing_marker: MISSING_MARKER.to_string(),
        }
    }
}

impl Config {
    /// Range checks for everything a run in `mode` will use.
    pub fn validate(&self, mode: Mode) -> Result<()> {
        self.matching.validate()?;
        self.tolerance.validate()?;
        if mode.uses_service() || self.grid.enrich {
            self.enrich.validate()?;
        }
        for (name, d) in [
            ("rounding.coord_decimals", self.rounding.coord_decimals),
            ("rounding.distance_decimals", self.rounding.distance_decimals),
        ] {
            if d > MAX_DECIMALS {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be at most {MAX_DECIMALS}, got {d}"
                )));
            }
        }
        if let Some(d) = self.classify.round_input {
            if d > MAX_DECIMALS {
                return Err(Error::InvalidConfig(format!(
                    "classify.round_input must be at most {MAX_DECIMALS}, got {d}"
                )));
            }
        }
        if self.project.batch_size == 0 {
            return Err(Error::InvalidConfig("project.batch_size must be positive".into()));
        }
        if !self.grid.spacing.is_finite() || self.grid.spacing <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "grid.spacing must be positive, got {}",
                self.grid.spacing
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_fills_defaults() {
        let json = r#"{ "matching": { "max_distance": 10.0 }, "tolerance": { "pair": 0.5 } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.matching.max_distance, 10.0);
        assert_eq!(cfg.tolerance.pair, Some(0.5));
        assert_eq!(cfg.enrich.batch_size, 300);
        assert_eq!(cfg.grid.id_prefix, "s_");
        assert_eq!(cfg.missing_marker, "brak_danych");
        cfg.validate(Mode::Both).unwrap();
    }

    #[test]
    fn service_settings_checked_only_when_used() {
        let mut cfg = Config::default();
        cfg.enrich.batch_size = 500;
        assert!(cfg.validate(Mode::Compare).is_ok());
        assert!(matches!(cfg.validate(Mode::Service), Err(Error::Enrichment(_))));
    }

    #[test]
    fn round_trips_through_json() {
        let mut cfg = Config::default();
        cfg.rounding.coord_decimals = 3;
        cfg.classify.input_axis = Some(crate::point::AxisConvention::EastingFirst);
        let s = serde_json::to_string(&cfg).unwrap();
        assert!(s.contains("easting_first"));
        assert_eq!(serde_json::from_str::<Config>(&s).unwrap(), cfg);
    }
}
