//! Spatial matcher: mutual nearest neighbours under an optional distance cap.
//!
//! Model
//! - Two immutable R-trees, one per dataset. Pass 1 finds the nearest
//!   reference for every input point; pass 2 the nearest input for every
//!   reference point.
//! - `(a, b)` is a pair iff each is the other's nearest and, when
//!   `max_distance > 0`, `|a − b| ≤ max_distance`. One-to-one follows from
//!   the nearest map being a function.
//! - Greedy by construction: a point whose nearest partner prefers someone
//!   else stays unmatched even if a farther free partner exists. There is no
//!   reassignment pass.
//! - Equidistant candidates are ordered by `TieBreak`; every tie is recorded
//!   and logged as a notice.

mod index;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::point::{Origin, Point};

pub use index::{IndexedPoint, Nearest, PointIndex, TieBreak, TIE_EPS};

/// Matching options.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchCfg {
    /// Largest accepted pair distance in metres; `0` disables the filter.
    pub max_distance: f64,
    pub tie_break: TieBreak,
}

impl Default for MatchCfg {
    fn default() -> Self {
        Self {
            max_distance: 0.0,
            tie_break: TieBreak::SmallestId,
        }
    }
}

impl MatchCfg {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.max_distance.is_finite() || self.max_distance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_pair_distance must be a non-negative number, got {}",
                self.max_distance
            )));
        }
        Ok(())
    }

    #[inline]
    fn admits(&self, distance: f64) -> bool {
        self.max_distance == 0.0 || distance <= self.max_distance
    }
}

/// One accepted pair, by dataset index.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedPair {
    pub input: usize,
    pub reference: usize,
    /// Unrounded canonical distance.
    pub distance: f64,
    /// `h_input − h_reference`, unrounded; `None` if either height is missing.
    pub diff_h: Option<f64>,
}

/// A nearest-neighbour query that had several equidistant candidates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchingAmbiguity {
    /// Dataset of the queried point.
    pub origin: Origin,
    pub id: String,
    pub chosen: String,
    pub passed_over: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MatchResult {
    /// Accepted pairs in input order.
    pub pairs: Vec<MatchedPair>,
    pub unmatched_input: Vec<usize>,
    pub unmatched_reference: Vec<usize>,
    pub ambiguities: Vec<MatchingAmbiguity>,
}

impl MatchResult {
    /// Pair index by input index.
    pub fn by_input(&self, len: usize) -> Vec<Option<usize>> {
        let mut v = vec![None; len];
        for (k, p) in self.pairs.iter().enumerate() {
            v[p.input] = Some(k);
        }
        v
    }
}

fn canonical_all(points: &[Point]) -> Result<Vec<Vector2<f64>>, Error> {
    points
        .iter()
        .map(|p| p.canonical().map_err(Error::from))
        .collect()
}

/// Mutual-nearest-neighbour pairing of two canonical datasets.
pub fn match_points(
    input: &[Point],
    reference: &[Point],
    cfg: &MatchCfg,
) -> Result<MatchResult, Error> {
    cfg.validate()?;
    let a_xy = canonical_all(input)?;
    let b_xy = canonical_all(reference)?;
    if input.is_empty() || reference.is_empty() {
        return Ok(MatchResult {
            unmatched_input: (0..input.len()).collect(),
            unmatched_reference: (0..reference.len()).collect(),
            ..MatchResult::default()
        });
    }

    let a_ids: Vec<String> = input.iter().map(|p| p.id.clone()).collect();
    let b_ids: Vec<String> = reference.iter().map(|p| p.id.clone()).collect();
    let ref_index = PointIndex::new(&b_xy, &b_ids);
    let inp_index = PointIndex::new(&a_xy, &a_ids);

    let mut ambiguities = Vec::new();
    let mut note = |origin: Origin, id: &str, n: &Nearest, ids: &[String]| {
        if n.tied.is_empty() {
            return;
        }
        let amb = MatchingAmbiguity {
            origin,
            id: id.to_string(),
            chosen: ids[n.index].clone(),
            passed_over: n.tied.iter().map(|&i| ids[i].clone()).collect(),
        };
        info!(
            ?origin,
            id = %amb.id,
            chosen = %amb.chosen,
            passed_over = ?amb.passed_over,
            "equidistant nearest neighbours; tie broken deterministically"
        );
        ambiguities.push(amb);
    };

    let mut nn_ref: Vec<Option<usize>> = Vec::with_capacity(input.len());
    for (i, q) in a_xy.iter().enumerate() {
        let n = ref_index.nearest(*q, cfg.tie_break);
        if let Some(n) = &n {
            note(Origin::Input, &a_ids[i], n, &b_ids);
        }
        nn_ref.push(n.map(|n| n.index));
    }
    let mut nn_inp: Vec<Option<usize>> = Vec::with_capacity(reference.len());
    for (j, q) in b_xy.iter().enumerate() {
        let n = inp_index.nearest(*q, cfg.tie_break);
        if let Some(n) = &n {
            note(Origin::Reference, &b_ids[j], n, &a_ids);
        }
        nn_inp.push(n.map(|n| n.index));
    }

    let mut pairs = Vec::new();
    let mut ref_taken = vec![false; reference.len()];
    let mut unmatched_input = Vec::new();
    for (a, nb) in nn_ref.iter().enumerate() {
        let accepted = nb.and_then(|b| {
            if nn_inp[b] != Some(a) {
                return None;
            }
            let distance = (a_xy[a] - b_xy[b]).norm();
            cfg.admits(distance).then_some((b, distance))
        });
        match accepted {
            Some((b, distance)) => {
                ref_taken[b] = true;
                let diff_h = match (input[a].h, reference[b].h) {
                    (Some(ha), Some(hb)) => Some(ha - hb),
                    _ => None,
                };
                pairs.push(MatchedPair {
                    input: a,
                    reference: b,
                    distance,
                    diff_h,
                });
            }
            None => unmatched_input.push(a),
        }
    }
    let unmatched_reference: Vec<usize> = (0..reference.len()).filter(|&b| !ref_taken[b]).collect();

    info!(
        pairs = pairs.len(),
        unmatched_input = unmatched_input.len(),
        unmatched_reference = unmatched_reference.len(),
        max_distance = cfg.max_distance,
        "matching finished"
    );
    Ok(MatchResult {
        pairs,
        unmatched_input,
        unmatched_reference,
        ambiguities,
    })
}
