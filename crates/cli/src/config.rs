//! Effective run configuration: JSON file (optional) overlaid by flags.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use diffh::api::{AxisConvention, Config};

/// Command-line values that override the file. `None` leaves the file value.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub max_distance: Option<f64>,
    pub pair_tolerance: Option<f64>,
    pub service_tolerance: Option<f64>,
    pub grid_spacing: Option<f64>,
    pub enrich_grid: bool,
    pub input_axis: Option<AxisConvention>,
    pub reference_axis: Option<AxisConvention>,
    pub boundary_axis: Option<AxisConvention>,
    pub round_input: bool,
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

pub fn apply(cfg: &mut Config, o: &Overrides) {
    if let Some(v) = o.max_distance {
        cfg.matching.max_distance = v;
    }
    if o.pair_tolerance.is_some() {
        cfg.tolerance.pair = o.pair_tolerance;
    }
    if o.service_tolerance.is_some() {
        cfg.tolerance.service = o.service_tolerance;
    }
    if let Some(v) = o.grid_spacing {
        cfg.grid.spacing = v;
    }
    if o.enrich_grid {
        cfg.grid.enrich = true;
    }
    if o.input_axis.is_some() {
        cfg.classify.input_axis = o.input_axis;
    }
    if o.reference_axis.is_some() {
        cfg.classify.reference_axis = o.reference_axis;
    }
    if o.boundary_axis.is_some() {
        cfg.classify.boundary_axis = o.boundary_axis;
    }
    if o.round_input {
        cfg.classify.round_input = Some(cfg.rounding.coord_decimals);
    }
}

pub fn save(path: &Path, cfg: &Config) -> Result<()> {
    fs::write(path, serde_json::to_vec_pretty(cfg)?)
        .with_context(|| format!("writing config {}", path.display()))
}
