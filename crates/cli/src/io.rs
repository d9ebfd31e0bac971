//! Delimited-text input and CSV/GeoJSON output.
//!
//! Reading
//! - Separator sniffed from the first non-empty line: `;`, tab, `,`, then
//!   runs of spaces. Every cell is read as a string; numbers are parsed by
//!   the classifier.
//! - Columns that are empty in every row are dropped.
//! - A first row whose coordinate cells are not numeric is a header.
//! - Point files: 4+ columns are `id, x, y, h` (extra columns ignored), 3 are
//!   `x, y, h`. Boundary files: 3+ columns are `id, x, y`, 2 are `x, y`.
//!
//! Writing goes through polars `CsvWriter` with `;` and the missing marker.

use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use diffh::api::{
    parse_number, partition, Evaluated, GridOutput, Mode, Origin, RawRecord, CanonicalSystem,
};
use polars::prelude::*;
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// `[id,] x, y, h`
    Points,
    /// `[id,] x, y`
    Boundary,
}

impl Layout {
    fn min_columns(self) -> usize {
        match self {
            Layout::Points => 3,
            Layout::Boundary => 2,
        }
    }
}

/// Read a point or boundary file into raw records.
pub fn read_records(path: &Path, layout: Layout) -> Result<Vec<RawRecord>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let sep = sniff_separator(&text);
    let body = match sep {
        Separator::Char(_) => text.into_owned(),
        Separator::Whitespace => collapse_whitespace(&text),
    };
    let columns = read_columns(body, sep.byte())
        .with_context(|| format!("parsing {}", path.display()))?;
    let records = to_records(columns, layout)
        .with_context(|| format!("interpreting {}", path.display()))?;
    info!(
        path = %path.display(),
        separator = %sep,
        records = records.len(),
        "dataset read"
    );
    Ok(records)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Separator {
    Char(u8),
    Whitespace,
}

impl Separator {
    fn byte(self) -> u8 {
        match self {
            Separator::Char(c) => c,
            Separator::Whitespace => b';',
        }
    }
}

impl std::fmt::Display for Separator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Separator::Char(b'\t') => f.write_str("tab"),
            Separator::Char(c) => write!(f, "{}", *c as char),
            Separator::Whitespace => f.write_str("whitespace"),
        }
    }
}

fn sniff_separator(text: &str) -> Separator {
    let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    for c in [b';', b'\t', b','] {
        if first.as_bytes().contains(&c) {
            return Separator::Char(c);
        }
    }
    Separator::Whitespace
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        out.push_str(&fields.join(";"));
        out.push('\n');
    }
    out
}

/// All cells as optional strings, column-major.
fn read_columns(body: String, sep: u8) -> Result<Vec<Vec<Option<String>>>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|o| o.with_separator(sep).with_truncate_ragged_lines(true))
        .into_reader_with_file_handle(Cursor::new(body.into_bytes()))
        .finish()?;
    debug!(rows = df.height(), cols = df.width(), "raw table shape");

    let mut columns = Vec::with_capacity(df.width());
    for s in df.get_columns() {
        let s = s.cast(&DataType::String)?;
        let col: Vec<Option<String>> = s
            .str()?
            .into_iter()
            .map(|v| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string))
            .collect();
        if col.iter().any(Option::is_some) {
            columns.push(col);
        }
    }
    Ok(columns)
}

fn to_records(columns: Vec<Vec<Option<String>>>, layout: Layout) -> Result<Vec<RawRecord>> {
    let width = columns.len();
    if width == 0 {
        bail!("file is empty");
    }
    if width < layout.min_columns() {
        bail!(
            "expected at least {} columns, found {width}",
            layout.min_columns()
        );
    }
    // (id, x, y, h) column positions
    let (id, x, y, h) = match (layout, width) {
        (Layout::Points, 3) => (None, 0, 1, Some(2)),
        (Layout::Points, _) => (Some(0), 1, 2, Some(3)),
        (Layout::Boundary, 2) => (None, 0, 1, None),
        (Layout::Boundary, _) => (Some(0), 1, 2, None),
    };
    if width > layout.min_columns() + 1 {
        info!(columns = width, "extra columns ignored");
    }

    let cell = |c: usize, r: usize| columns[c][r].as_deref();
    let rows = columns[0].len();
    let mut start = 0;
    if rows > 0 {
        let numeric = |c| cell(c, 0).and_then(parse_number).is_some();
        if !(numeric(x) && numeric(y)) {
            debug!("header row skipped");
            start = 1;
        }
    }

    let mut out = Vec::with_capacity(rows.saturating_sub(start));
    for r in start..rows {
        if columns.iter().all(|c| c[r].is_none()) {
            continue;
        }
        out.push(RawRecord::new(
            id.and_then(|c| cell(c, r)),
            cell(x, r).unwrap_or(""),
            cell(y, r).unwrap_or(""),
            h.and_then(|c| cell(c, r)),
        ));
    }
    if out.is_empty() {
        bail!("no data rows");
    }
    Ok(out)
}

/// `<stem><suffix>.<ext>` next to `stem`.
pub fn sibling(stem: &Path, suffix: &str, ext: &str) -> PathBuf {
    let name = stem
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "diffh".to_string());
    stem.with_file_name(format!("{name}{suffix}.{ext}"))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output dir {}", parent.display()))?;
        }
    }
    Ok(())
}

fn write_csv(path: &Path, mut df: DataFrame, marker: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b';')
        .with_null_value(marker.to_string())
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn write_json(path: &Path, doc: &Value) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, serde_json::to_vec_pretty(doc)?)
        .with_context(|| format!("writing {}", path.display()))
}

fn num(rows: &[&Evaluated], g: impl Fn(&Evaluated) -> Option<f64>) -> Vec<Option<f64>> {
    rows.iter().map(|r| g(*r)).collect()
}

/// Evaluation table for `rows`, with the columns `mode` produces.
pub fn evaluation_frame(rows: &[&Evaluated], mode: Mode) -> Result<DataFrame> {
    let mut cols = vec![
        Series::new("id".into(), rows.iter().map(|r| r.id.clone()).collect::<Vec<_>>()),
        Series::new("x".into(), num(rows, |r| Some(r.x))),
        Series::new("y".into(), num(rows, |r| Some(r.y))),
        Series::new("h".into(), num(rows, |r| r.h)),
    ];
    if mode.uses_service() {
        cols.push(Series::new("diff_h_service".into(), num(rows, |r| r.diff_h_service)));
        cols.push(Series::new("service_h".into(), num(rows, |r| r.service_h)));
    }
    if mode == Mode::Both {
        cols.push(Series::new("diff_h_service_pair".into(), num(rows, |r| r.diff_h_service_pair)));
    }
    cols.push(Series::new(
        "within_tolerance".into(),
        rows.iter().map(|r| r.within_tolerance()).collect::<Vec<_>>(),
    ));
    cols.push(Series::new(
        "diff_used".into(),
        rows.iter()
            .map(|r| r.verdict.diff_used.map(|d| d.as_str().to_string()))
            .collect::<Vec<_>>(),
    ));
    if mode.uses_reference() {
        cols.push(Series::new(
            "ref_id".into(),
            rows.iter()
                .map(|r| r.pair.as_ref().map(|p| p.ref_id.clone()))
                .collect::<Vec<_>>(),
        ));
        cols.push(Series::new("ref_x".into(), num(rows, |r| r.pair.as_ref().map(|p| p.ref_x))));
        cols.push(Series::new("ref_y".into(), num(rows, |r| r.pair.as_ref().map(|p| p.ref_y))));
        cols.push(Series::new("ref_h".into(), num(rows, |r| r.pair.as_ref().and_then(|p| p.ref_h))));
        cols.push(Series::new("diff_h".into(), num(rows, |r| r.diff_h())));
        cols.push(Series::new(
            "pair_distance".into(),
            num(rows, |r| r.pair.as_ref().map(|p| p.distance)),
        ));
    }
    cols.push(Series::new(
        "export".into(),
        rows.iter().map(|r| r.export()).collect::<Vec<_>>(),
    ));
    Ok(DataFrame::new(cols)?)
}

fn evaluation_geojson(rows: &[Evaluated], mode: Mode, system: CanonicalSystem) -> Value {
    let features: Vec<Value> = rows
        .iter()
        .map(|r| {
            let mut props = json!({
                "id": r.id,
                "x": r.x,
                "y": r.y,
                "h": r.h,
                "within_tolerance": r.within_tolerance(),
                "diff_used": r.verdict.diff_used.map(|d| d.as_str()),
                "export": r.export(),
            });
            if mode.uses_service() {
                props["service_h"] = json!(r.service_h);
                props["diff_h_service"] = json!(r.diff_h_service);
            }
            if mode.uses_reference() {
                let p = r.pair.as_ref();
                props["ref_id"] = json!(p.map(|p| &p.ref_id));
                props["ref_h"] = json!(p.and_then(|p| p.ref_h));
                props["diff_h"] = json!(r.diff_h());
                props["pair_distance"] = json!(p.map(|p| p.distance));
            }
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [r.canon.x, r.canon.y] },
                "properties": props,
            })
        })
        .collect();
    feature_collection(features, system)
}

fn feature_collection(features: Vec<Value>, system: CanonicalSystem) -> Value {
    json!({
        "type": "FeatureCollection",
        "crs": {
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", system.epsg()) }
        },
        "features": features,
    })
}

/// Write `<stem>.csv`, non-empty partitions and `<stem>.geojson`.
pub fn write_evaluation(
    stem: &Path,
    rows: &[Evaluated],
    mode: Mode,
    system: CanonicalSystem,
    marker: &str,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let all: Vec<&Evaluated> = rows.iter().collect();
    let path = sibling(stem, "", "csv");
    write_csv(&path, evaluation_frame(&all, mode)?, marker)?;
    written.push(path);

    let parts = partition(rows);
    for (suffix, part) in [
        ("_accurate", &parts.accurate),
        ("_inaccurate", &parts.inaccurate),
        ("_undetermined", &parts.undetermined),
    ] {
        if part.is_empty() {
            debug!(suffix, "partition empty; not written");
            continue;
        }
        let path = sibling(stem, suffix, "csv");
        write_csv(&path, evaluation_frame(part, mode)?, marker)?;
        written.push(path);
    }

    let path = sibling(stem, "", "geojson");
    write_json(&path, &evaluation_geojson(rows, mode, system))?;
    written.push(path);
    info!(
        files = written.len(),
        accurate = parts.accurate.len(),
        inaccurate = parts.inaccurate.len(),
        undetermined = parts.undetermined.len(),
        "evaluation written"
    );
    Ok(written)
}

fn origin_str(o: Origin) -> &'static str {
    match o {
        Origin::Input => "input",
        Origin::Reference => "reference",
        Origin::GridCandidate => "grid_candidate",
    }
}

/// Write `<stem>_grid.csv` and `<stem>_grid.geojson`. Grid `x`/`y` are the
/// canonical northing/easting.
pub fn write_grid(
    stem: &Path,
    grid: &GridOutput,
    system: CanonicalSystem,
    marker: &str,
) -> Result<Vec<PathBuf>> {
    let pts = &grid.selection.points;
    let df = DataFrame::new(vec![
        Series::new("grid_id".into(), pts.iter().map(|p| p.grid_id.clone()).collect::<Vec<_>>()),
        Series::new("source_id".into(), pts.iter().map(|p| p.source_id.clone()).collect::<Vec<_>>()),
        Series::new("x".into(), pts.iter().map(|p| p.canon.y).collect::<Vec<_>>()),
        Series::new("y".into(), pts.iter().map(|p| p.canon.x).collect::<Vec<_>>()),
        Series::new("h".into(), pts.iter().map(|p| p.h).collect::<Vec<_>>()),
        Series::new("service_h".into(), pts.iter().map(|p| p.service_h).collect::<Vec<_>>()),
        Series::new(
            "diff_used".into(),
            pts.iter()
                .map(|p| p.diff_used.map(|d| d.as_str().to_string()))
                .collect::<Vec<_>>(),
        ),
        Series::new("abs_diff".into(), pts.iter().map(|p| p.abs_diff).collect::<Vec<_>>()),
        Series::new("cell_q".into(), pts.iter().map(|p| p.cell.q).collect::<Vec<_>>()),
        Series::new("cell_r".into(), pts.iter().map(|p| p.cell.r).collect::<Vec<_>>()),
        Series::new(
            "origin".into(),
            pts.iter().map(|p| origin_str(p.origin)).collect::<Vec<_>>(),
        ),
    ])?;
    let csv = sibling(stem, "_grid", "csv");
    write_csv(&csv, df, marker)?;

    let features: Vec<Value> = pts
        .iter()
        .map(|p| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [p.canon.x, p.canon.y] },
                "properties": {
                    "grid_id": p.grid_id,
                    "source_id": p.source_id,
                    "h": p.h,
                    "service_h": p.service_h,
                    "diff_used": p.diff_used.map(|d| d.as_str()),
                    "abs_diff": p.abs_diff,
                    "cell_q": p.cell.q,
                    "cell_r": p.cell.r,
                    "origin": origin_str(p.origin),
                },
            })
        })
        .collect();
    let geojson = sibling(stem, "_grid", "geojson");
    write_json(&geojson, &feature_collection(features, system))?;
    info!(
        cells = grid.selection.cells.len(),
        selected = pts.len(),
        empty = grid.selection.empty_cells(),
        "grid written"
    );
    Ok(vec![csv, geojson])
}
