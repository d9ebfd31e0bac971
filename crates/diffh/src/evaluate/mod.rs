//! Height differences, tolerance verdicts and result ordering.
//!
//! Differences (all `None` when an operand is missing):
//! - `diff_h_service = h − service_h`
//! - `diff_h = h − ref_h` for a matched pair
//! - `diff_h_service_pair = ref_h − service_h`
//!
//! Every difference is computed from unrounded operands and then rounded
//! half-to-even; pair distances are rounded half-away-from-zero. Verdicts
//! compare the rounded difference against the tolerance (`|d| ≤ tol`).

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::matching::MatchResult;
use crate::point::Point;
use crate::rounding::RoundingCfg;

/// Tolerances; `None` means "not configured".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceCfg {
    /// Limit for `|diff_h|` of a matched pair.
    pub pair: Option<f64>,
    /// Limit for `|diff_h_service|`.
    pub service: Option<f64>,
}

impl ToleranceCfg {
    pub fn validate(&self) -> Result<(), Error> {
        for (name, t) in [("pair_tolerance", self.pair), ("service_tolerance", self.service)] {
            if let Some(t) = t {
                if !t.is_finite() || t < 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "{name} must be a non-negative number, got {t}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn any(&self) -> bool {
        self.pair.is_some() || self.service.is_some()
    }
}

/// Which difference produced a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Service,
    Pair,
}

impl DiffKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffKind::Service => "diff_h_service",
            DiffKind::Pair => "diff_h",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Within,
    Exceeded,
    /// No configured tolerance had a difference to judge.
    Undetermined,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToleranceVerdict {
    pub diff_used: Option<DiffKind>,
    pub verdict: Verdict,
}

impl ToleranceVerdict {
    pub const UNDETERMINED: ToleranceVerdict = ToleranceVerdict {
        diff_used: None,
        verdict: Verdict::Undetermined,
    };

    /// `Some(true/false)` for a decided verdict; never coerces undetermined.
    pub fn within_tolerance(&self) -> Option<bool> {
        match self.verdict {
            Verdict::Within => Some(true),
            Verdict::Exceeded => Some(false),
            Verdict::Undetermined => None,
        }
    }
}

/// Service-relative difference first, then the pair difference; each only
/// with its tolerance configured.
pub fn verdict(
    diff_service: Option<f64>,
    diff_pair: Option<f64>,
    tol: &ToleranceCfg,
) -> ToleranceVerdict {
    let judged = match (diff_service.zip(tol.service), diff_pair.zip(tol.pair)) {
        (Some((d, t)), _) => Some((DiffKind::Service, d, t)),
        (None, Some((d, t))) => Some((DiffKind::Pair, d, t)),
        (None, None) => None,
    };
    match judged {
        Some((kind, d, t)) => ToleranceVerdict {
            diff_used: Some(kind),
            verdict: if d.abs() <= t {
                Verdict::Within
            } else {
                Verdict::Exceeded
            },
        },
        None => ToleranceVerdict::UNDETERMINED,
    }
}

/// Matched reference side of an evaluated row.
#[derive(Clone, Debug, PartialEq)]
pub struct PairEval {
    pub reference_index: usize,
    pub ref_id: String,
    pub ref_x: f64,
    pub ref_y: f64,
    pub ref_h: Option<f64>,
    pub diff_h: Option<f64>,
    pub distance: f64,
}

/// One input point after evaluation. Values are rounded for output.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluated {
    pub input_index: usize,
    pub id: String,
    /// Raw input coordinates as read.
    pub x: f64,
    pub y: f64,
    /// Canonical `(easting, northing)`.
    pub canon: Vector2<f64>,
    pub h: Option<f64>,
    pub service_h: Option<f64>,
    pub diff_h_service: Option<f64>,
    pub pair: Option<PairEval>,
    pub diff_h_service_pair: Option<f64>,
    pub verdict: ToleranceVerdict,
}

impl Evaluated {
    pub fn diff_h(&self) -> Option<f64> {
        self.pair.as_ref().and_then(|p| p.diff_h)
    }

    /// Difference used for ordering: service-relative when present, else pair.
    pub fn ordering_diff(&self) -> Option<f64> {
        self.diff_h_service.or_else(|| self.diff_h())
    }

    /// Difference that produced the verdict, if any.
    pub fn driving_diff(&self) -> Option<f64> {
        match self.verdict.diff_used? {
            DiffKind::Service => self.diff_h_service,
            DiffKind::Pair => self.diff_h(),
        }
    }

    pub fn within_tolerance(&self) -> Option<bool> {
        self.verdict.within_tolerance()
    }

    /// Selected for the accurate export.
    pub fn export(&self) -> bool {
        self.verdict.verdict == Verdict::Within
    }
}

/// Sources of an evaluation pass; absent parts simply leave columns empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvalInput<'a> {
    pub input: &'a [Point],
    pub reference: &'a [Point],
    pub matches: Option<&'a MatchResult>,
    /// Service height per input point.
    pub service: Option<&'a [Option<f64>]>,
}

#[inline]
fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

/// Evaluate every input point and order the rows.
pub fn evaluate(
    src: EvalInput<'_>,
    tol: &ToleranceCfg,
    rounding: &RoundingCfg,
) -> Result<Vec<Evaluated>, Error> {
    let pair_of = src.matches.map(|m| m.by_input(src.input.len()));
    let r = |v: Option<f64>| v.map(|v| rounding.coord(v));
    let mut rows = Vec::with_capacity(src.input.len());
    for (i, p) in src.input.iter().enumerate() {
        let canon = p.canonical()?;
        let service_raw = src.service.and_then(|s| s.get(i).copied().flatten());
        let pair = pair_of
            .as_ref()
            .and_then(|v| v[i])
            .and_then(|k| src.matches.map(|m| &m.pairs[k]));
        let ref_point = pair.and_then(|mp| src.reference.get(mp.reference));

        let diff_h_service = r(sub(p.h, service_raw));
        let diff_h = pair.and_then(|mp| r(mp.diff_h));
        let diff_h_service_pair = r(sub(ref_point.and_then(|q| q.h), service_raw));
        let pair_eval = match (pair, ref_point) {
            (Some(mp), Some(q)) => Some(PairEval {
                reference_index: mp.reference,
                ref_id: q.id.clone(),
                ref_x: rounding.coord(q.x_raw),
                ref_y: rounding.coord(q.y_raw),
                ref_h: r(q.h),
                diff_h,
                distance: rounding.distance(mp.distance),
            }),
            _ => None,
        };
        rows.push(Evaluated {
            input_index: i,
            id: p.id.clone(),
            x: rounding.coord(p.x_raw),
            y: rounding.coord(p.y_raw),
            canon: Vector2::new(rounding.coord(canon.x), rounding.coord(canon.y)),
            h: r(p.h),
            service_h: r(service_raw),
            diff_h_service,
            pair: pair_eval,
            diff_h_service_pair,
            verdict: verdict(diff_h_service, diff_h, tol),
        });
    }
    sort_rows(&mut rows);
    debug!(rows = rows.len(), "evaluation finished");
    Ok(rows)
}

/// Descending by `|ordering_diff|`; rows without a difference last; stable.
pub fn sort_rows(rows: &mut [Evaluated]) {
    rows.sort_by(|a, b| match (a.ordering_diff(), b.ordering_diff()) {
        (Some(x), Some(y)) => y.abs().total_cmp(&x.abs()),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Rows split by verdict, each keeping the evaluated order.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub accurate: Vec<&'a Evaluated>,
    pub inaccurate: Vec<&'a Evaluated>,
    pub undetermined: Vec<&'a Evaluated>,
}

pub fn partition(rows: &[Evaluated]) -> Partition<'_> {
    let mut p = Partition::default();
    for row in rows {
        match row.verdict.verdict {
            Verdict::Within => p.accurate.push(row),
            Verdict::Exceeded => p.inaccurate.push(row),
            Verdict::Undetermined => p.undetermined.push(row),
        }
    }
    p
}
