//! Coordinate keys and the collision rule for merging service heights.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use nalgebra::Vector2;
use tracing::info;

use crate::error::ProjectionError;
use crate::point::Point;
use crate::rounding::round_half_even;

/// Canonical `(easting, northing)` rounded half-to-even and stored as scaled
/// integers, so equality does not depend on float formatting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    northing: i64,
    easting: i64,
    decimals: u32,
}

impl CoordKey {
    pub fn from_canonical(v: Vector2<f64>, decimals: u32) -> Self {
        Self::from_parts(v.y, v.x, decimals)
    }

    /// Key from a northing/easting pair as the elevation service echoes it.
    pub fn from_parts(northing: f64, easting: f64, decimals: u32) -> Self {
        Self {
            northing: scaled(northing, decimals),
            easting: scaled(easting, decimals),
            decimals,
        }
    }

    pub fn northing(&self) -> f64 {
        self.northing as f64 / 10f64.powi(self.decimals as i32)
    }

    pub fn easting(&self) -> f64 {
        self.easting as f64 / 10f64.powi(self.decimals as i32)
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }
}

fn scaled(v: f64, decimals: u32) -> i64 {
    (round_half_even(v, decimals) * 10f64.powi(decimals as i32)).round() as i64
}

fn write_scaled(f: &mut fmt::Formatter<'_>, v: i64, decimals: u32) -> fmt::Result {
    if decimals == 0 {
        return write!(f, "{v}");
    }
    let scale = 10i64.pow(decimals);
    let sign = if v < 0 { "-" } else { "" };
    let a = v.unsigned_abs();
    let s = scale as u64;
    write!(f, "{sign}{}.{:0w$}", a / s, a % s, w = decimals as usize)
}

/// `"<northing> <easting>"`, the pair format of the elevation service.
impl fmt::Display for CoordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, self.northing, self.decimals)?;
        f.write_str(" ")?;
        write_scaled(f, self.easting, self.decimals)
    }
}

/// Distinct points that round to one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCollision {
    pub key: CoordKey,
    /// First point in input order; its lookup serves every member.
    pub owner: String,
    pub others: Vec<String>,
}

/// Deduplicated keys in first-seen order and the points each one serves.
#[derive(Clone, Debug, Default)]
pub struct KeyPlan {
    pub keys: Vec<CoordKey>,
    /// Point indices per key, owner first.
    pub members: Vec<Vec<usize>>,
    pub collisions: Vec<KeyCollision>,
}

/// Build keys for every point. Colliding points share the owner's height
/// (first in input order); each collision is reported, never dropped.
pub fn plan_keys(points: &[Point], decimals: u32) -> Result<KeyPlan, ProjectionError> {
    let sites = points
        .iter()
        .map(|p| Ok((p.id.as_str(), p.canonical()?)))
        .collect::<Result<Vec<_>, ProjectionError>>()?;
    Ok(plan_site_keys(&sites, decimals))
}

/// [`plan_keys`] over `(id, canonical)` pairs that are not dataset points.
pub fn plan_site_keys(sites: &[(&str, Vector2<f64>)], decimals: u32) -> KeyPlan {
    let mut slot: HashMap<CoordKey, usize> = HashMap::with_capacity(sites.len());
    let mut plan = KeyPlan::default();
    for (i, &(_, canon)) in sites.iter().enumerate() {
        let key = CoordKey::from_canonical(canon, decimals);
        match slot.get(&key) {
            Some(&k) => plan.members[k].push(i),
            None => {
                slot.insert(key, plan.keys.len());
                plan.keys.push(key);
                plan.members.push(vec![i]);
            }
        }
    }
    for (key, members) in plan.keys.iter().zip(&plan.members) {
        if members.len() > 1 {
            let c = KeyCollision {
                key: *key,
                owner: sites[members[0]].0.to_string(),
                others: members[1..].iter().map(|&i| sites[i].0.to_string()).collect(),
            };
            info!(key = %c.key, owner = %c.owner, others = ?c.others, "coordinate key collision; sharing owner's height");
            plan.collisions.push(c);
        }
    }
    plan
}

/// Consecutive index ranges of at most `size` covering `0..len` exactly once.
pub fn batch_ranges(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}
