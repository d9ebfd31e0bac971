use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use diffh::api::{
    partition, AxisConvention, CanonicalSystem, Collaborators, Config, ElevationLookup, Mode,
    RunInput, RunOutput,
};
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::fmt::SubscriberBuilder;

mod config;
mod geodesy;
mod io;
mod nmt;
mod provenance;

use io::Layout;
use provenance::Payload;

/// Detected once per process.
static ACCELERATOR: OnceLock<diffh::api::Accelerator> = OnceLock::new();

#[derive(Parser)]
#[command(name = "diffh")]
#[command(about = "Height reconciliation of PL-2000 survey points")]
struct Cmd {
    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Evaluate heights and write tables next to --out
    Run(RunArgs),
    /// Print the provenance block of this build
    Report,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// Reference file only
    Compare,
    /// NMT elevation service only
    Service,
    /// Both sources
    Both,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Compare => Mode::Compare,
            ModeArg::Service => Mode::Service,
            ModeArg::Both => Mode::Both,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AxisArg {
    /// First coordinate column is the northing (X)
    NorthingFirst,
    /// First coordinate column is the easting (Y)
    EastingFirst,
}

impl From<AxisArg> for AxisConvention {
    fn from(a: AxisArg) -> Self {
        match a {
            AxisArg::NorthingFirst => AxisConvention::NorthingFirst,
            AxisArg::EastingFirst => AxisConvention::EastingFirst,
        }
    }
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, value_enum)]
    mode: ModeArg,
    /// Points to evaluate: `[id,] x, y, h`
    #[arg(long)]
    input: PathBuf,
    /// Reference points (compare/both)
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Boundary ring for grid thinning: `[id,] x, y`
    #[arg(long)]
    boundary: Option<PathBuf>,
    /// Output stem; `<out>.csv`, `<out>_accurate.csv`, ... are written
    #[arg(long)]
    out: PathBuf,
    /// JSON configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the effective configuration here after a successful run
    #[arg(long)]
    save_config: Option<PathBuf>,
    /// Largest pair distance in metres; 0 disables the limit
    #[arg(long)]
    max_distance: Option<f64>,
    #[arg(long)]
    pair_tolerance: Option<f64>,
    #[arg(long)]
    service_tolerance: Option<f64>,
    /// Hex cell spacing in metres
    #[arg(long)]
    grid_spacing: Option<f64>,
    /// Look up service heights for the selected grid points
    #[arg(long)]
    enrich_grid: bool,
    /// Round raw x/y/h to the coordinate precision when reading
    #[arg(long)]
    round_input: bool,
    #[arg(long, value_enum)]
    input_axis: Option<AxisArg>,
    #[arg(long, value_enum)]
    reference_axis: Option<AxisArg>,
    #[arg(long, value_enum)]
    boundary_axis: Option<AxisArg>,
    /// Project on the calling thread only
    #[arg(long)]
    no_accel: bool,
    #[arg(long, env = "DIFFH_NMT_ENDPOINT", default_value = nmt::DEFAULT_ENDPOINT)]
    endpoint: String,
}

impl RunArgs {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            max_distance: self.max_distance,
            pair_tolerance: self.pair_tolerance,
            service_tolerance: self.service_tolerance,
            grid_spacing: self.grid_spacing,
            enrich_grid: self.enrich_grid,
            input_axis: self.input_axis.map(Into::into),
            reference_axis: self.reference_axis.map(Into::into),
            boundary_axis: self.boundary_axis.map(Into::into),
            round_input: self.round_input,
        }
    }
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    SubscriberBuilder::default()
        .with_target(false)
        .with_max_level(if cmd.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();
    match cmd.action {
        Action::Run(args) => run(args),
        Action::Report => report(),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mode = Mode::from(args.mode);
    let mut cfg = config::load(args.config.as_deref())?;
    config::apply(&mut cfg, &args.overrides());
    info!(?mode, input = %args.input.display(), out = %args.out.display(), "run");

    let input = io::read_records(&args.input, Layout::Points)?;
    let reference = match &args.reference {
        Some(p) if mode.uses_reference() => Some(io::read_records(p, Layout::Points)?),
        _ => None,
    };
    let boundary = args
        .boundary
        .as_deref()
        .map(|p| io::read_records(p, Layout::Boundary))
        .transpose()?;

    let geodesy = geodesy::ProjGeodesy::new()?;
    let lookup = if mode.uses_service() || cfg.grid.enrich {
        Some(nmt::NmtLookup::new(&args.endpoint, cfg.enrich.key_decimals)?)
    } else {
        None
    };
    let accelerator = if args.no_accel {
        diffh::api::Accelerator::disabled()
    } else {
        ACCELERATOR
            .get_or_init(diffh::api::Accelerator::detect)
            .clone()
    };
    let collab = Collaborators {
        geodesy: &geodesy,
        elevation: lookup.as_ref().map(|l| l as &dyn ElevationLookup),
        accelerator,
    };

    let out = diffh::api::run(
        mode,
        RunInput {
            input: &input,
            reference: reference.as_deref(),
            boundary: boundary.as_deref(),
        },
        &collab,
        &cfg,
    )?;

    // Nothing is written unless the run succeeded.
    let system = cfg.project.target;
    let mut written =
        io::write_evaluation(&args.out, &out.rows, mode, system, &cfg.missing_marker)?;
    if let Some(grid) = &out.grid {
        written.extend(io::write_grid(&args.out, grid, system, &cfg.missing_marker)?);
    }

    let inputs: Vec<String> = [Some(&args.input), args.reference.as_ref(), args.boundary.as_ref()]
        .into_iter()
        .flatten()
        .map(|p| p.display().to_string())
        .collect();
    let payload = Payload::new(json!({
        "mode": mode,
        "endpoint": lookup.as_ref().map(|_| &args.endpoint),
        "config": cfg,
    }))
    .with_inputs(inputs)
    .with_summary(summary(&out, system));
    for group in by_stem(&written) {
        provenance::write_sidecar(group.as_slice(), &payload)?;
    }
    if let Some(path) = &args.save_config {
        config::save(path, &cfg)?;
    }
    info!(files = written.len(), "outputs written");
    Ok(())
}

/// Run counts for the log and the provenance sidecars.
fn summary(out: &RunOutput, system: CanonicalSystem) -> Value {
    let parts = partition(&out.rows);
    let mut s = json!({
        "canonical_epsg": system.epsg(),
        "input_zone": out.input_detection.zone.epsg(),
        "input_axis": out.input_detection.axis,
        "rows": out.rows.len(),
        "accurate": parts.accurate.len(),
        "inaccurate": parts.inaccurate.len(),
        "undetermined": parts.undetermined.len(),
        "projection": {
            "batches": out.projection.batches,
            "accelerated_batches": out.projection.accelerated_batches,
            "fell_back": out.projection.fell_back,
        },
    });
    if let Some(m) = &out.matches {
        info!(
            pairs = m.pairs.len(),
            unmatched_input = m.unmatched_input.len(),
            unmatched_reference = m.unmatched_reference.len(),
            ambiguities = m.ambiguities.len(),
            "matching summary"
        );
        s["matching"] = json!({
            "pairs": m.pairs.len(),
            "unmatched_input": m.unmatched_input.len(),
            "unmatched_reference": m.unmatched_reference.len(),
            "ambiguities": m.ambiguities.len(),
        });
    }
    if let Some(e) = &out.enrichment {
        info!(
            missing = e.missing(),
            failed_batches = e.failed_batches,
            collisions = e.collisions.len(),
            "enrichment summary"
        );
        s["enrichment"] = json!({
            "batches": e.batches,
            "failed_batches": e.failed_batches,
            "retried_keys": e.retried_keys,
            "calls": e.calls,
            "missing": e.missing(),
            "collisions": e.collisions.len(),
        });
    }
    if let Some(g) = &out.grid {
        s["grid"] = json!({
            "cells": g.selection.cells.len(),
            "selected": g.selection.points.len(),
            "empty_cells": g.selection.empty_cells(),
            "enriched": g.enrichment.is_some(),
        });
    }
    s
}

/// Written files grouped by file stem, first-seen order.
fn by_stem(paths: &[PathBuf]) -> Vec<Vec<&Path>> {
    let mut groups: Vec<(OsString, Vec<&Path>)> = Vec::new();
    for p in paths {
        let stem = p.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
        match groups.iter_mut().find(|(s, _)| *s == stem) {
            Some((_, g)) => g.push(p),
            None => groups.push((stem, vec![p])),
        }
    }
    groups.into_iter().map(|(_, g)| g).collect()
}

fn report() -> Result<()> {
    let obj = json!({
        "build": provenance::build_info(),
        "config": Config::default(),
        "endpoint": nmt::DEFAULT_ENDPOINT,
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
