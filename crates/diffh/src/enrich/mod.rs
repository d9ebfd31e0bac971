//! Elevation enrichment: batched, retrying lookups keyed by rounded coordinates.
//!
//! Purpose
//! - Attach a service height to every canonical point where the external
//!   elevation lookup has one. Missing data is a `None`, never an error.
//!
//! Policy (per batch of at most `batch_size` distinct keys)
//! - Transport failure or empty response: retry the whole batch with
//!   exponential backoff up to `retry_max_attempts`; then every key in the
//!   batch is missing.
//! - All-zero response for a multi-key batch: retried like a failure and
//!   accepted on the last attempt.
//! - Partial response: each absent key is retried alone under the same
//!   attempt bound, then marked missing.
//! - Configuration failure reported by the lookup: fatal.
//!
//! Batches run sequentially; one batch completes before the next is sent.

mod keys;

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EnrichmentError;
use crate::point::Point;

pub use keys::{batch_ranges, plan_keys, plan_site_keys, CoordKey, KeyCollision, KeyPlan};

/// Hard upper bound imposed by the elevation service.
pub const MAX_BATCH: usize = 300;

/// Failure of a single lookup call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    /// Network, timeout, throttling or server-side failure; worth retrying.
    #[error("transient lookup failure: {0}")]
    Transient(String),
    /// The endpoint itself is unusable (bad URL, rejected request).
    #[error("lookup misconfigured: {0}")]
    Config(String),
}

/// External elevation lookup. Returns heights for the keys it knows; keys
/// without data are simply absent from the map.
pub trait ElevationLookup {
    fn lookup(&self, keys: &[CoordKey]) -> Result<HashMap<CoordKey, f64>, LookupError>;
}

impl<L: ElevationLookup + ?Sized> ElevationLookup for &L {
    fn lookup(&self, keys: &[CoordKey]) -> Result<HashMap<CoordKey, f64>, LookupError> {
        (**self).lookup(keys)
    }
}

/// Enrichment options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichCfg {
    /// Distinct keys per lookup call (1..=300).
    pub batch_size: usize,
    /// Decimals of the coordinate key (half to even).
    pub key_decimals: u32,
    /// Calls per batch or per individually retried key, first call included.
    pub retry_max_attempts: u32,
    /// Base backoff; doubled after every failed attempt.
    pub retry_backoff_ms: u64,
    /// Treat an all-zero multi-key response as a failure.
    pub retry_on_all_zero: bool,
}

impl Default for EnrichCfg {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH,
            key_decimals: 2,
            retry_max_attempts: 5,
            retry_backoff_ms: 1_000,
            retry_on_all_zero: true,
        }
    }
}

impl EnrichCfg {
    pub fn validate(&self) -> Result<(), EnrichmentError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH {
            return Err(EnrichmentError::InvalidBatchSize(self.batch_size));
        }
        if self.key_decimals > 6 {
            return Err(EnrichmentError::InvalidPrecision(self.key_decimals));
        }
        if self.retry_max_attempts == 0 {
            return Err(EnrichmentError::InvalidAttempts);
        }
        Ok(())
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Outcome of one enrichment pass.
#[derive(Clone, Debug, Default)]
pub struct EnrichReport {
    /// Service height per input point, in input order.
    pub heights: Vec<Option<f64>>,
    pub batches: usize,
    /// Batches that exhausted their attempts without a usable response.
    pub failed_batches: usize,
    /// Keys retried individually after a partial response.
    pub retried_keys: usize,
    /// Lookup calls issued, retries included.
    pub calls: usize,
    pub collisions: Vec<KeyCollision>,
}

impl EnrichReport {
    pub fn missing(&self) -> usize {
        self.heights.iter().filter(|h| h.is_none()).count()
    }
}

enum Attempt {
    Accept(HashMap<CoordKey, f64>),
    Retry(&'static str),
}

/// Enrichment client over an elevation lookup collaborator.
pub struct EnrichmentClient<L> {
    lookup: L,
    cfg: EnrichCfg,
}

impl<L: ElevationLookup> EnrichmentClient<L> {
    /// Rejects invalid batch size, precision or attempt bound.
    pub fn new(lookup: L, cfg: EnrichCfg) -> Result<Self, EnrichmentError> {
        cfg.validate()?;
        Ok(Self { lookup, cfg })
    }

    pub fn cfg(&self) -> &EnrichCfg {
        &self.cfg
    }

    /// Look up heights for canonical points.
    pub fn enrich(&self, points: &[Point]) -> crate::Result<EnrichReport> {
        let plan = plan_keys(points, self.cfg.key_decimals)?;
        self.run_plan(plan, points.len())
    }

    /// Look up heights at `(id, canonical)` sites, e.g. grid candidates.
    /// Heights come back in site order.
    pub fn enrich_at(&self, sites: &[(&str, Vector2<f64>)]) -> crate::Result<EnrichReport> {
        let plan = plan_site_keys(sites, self.cfg.key_decimals);
        self.run_plan(plan, sites.len())
    }

    fn run_plan(&self, plan: KeyPlan, len: usize) -> crate::Result<EnrichReport> {
        let mut by_key: Vec<Option<f64>> = vec![None; plan.keys.len()];
        let mut report = EnrichReport {
            collisions: plan.collisions.clone(),
            ..EnrichReport::default()
        };

        for (b, range) in batch_ranges(plan.keys.len(), self.cfg.batch_size)
            .into_iter()
            .enumerate()
        {
            report.batches += 1;
            let start = range.start;
            let keys = &plan.keys[range.clone()];
            let Some(found) = self.call_with_retry(keys, b, &mut report.calls)? else {
                warn!(batch = b, keys = keys.len(), "batch exhausted retries; heights missing");
                report.failed_batches += 1;
                continue;
            };
            for (slot, key) in by_key[range].iter_mut().zip(keys) {
                *slot = found.get(key).copied();
            }
            let absent: Vec<usize> = (0..keys.len())
                .filter(|&i| !found.contains_key(&keys[i]))
                .collect();
            if absent.is_empty() {
                continue;
            }
            debug!(batch = b, absent = absent.len(), "partial response; retrying keys individually");
            for i in absent {
                report.retried_keys += 1;
                let key = keys[i];
                let single = self.call_with_retry(&[key], b, &mut report.calls)?;
                let h = single.and_then(|m| m.get(&key).copied());
                if h.is_none() {
                    debug!(batch = b, %key, "no height after individual retries");
                }
                by_key[start + i] = h;
            }
        }

        report.heights = vec![None; len];
        for (h, members) in by_key.iter().zip(&plan.members) {
            for &i in members {
                report.heights[i] = *h;
            }
        }
        info!(
            points = len,
            keys = plan.keys.len(),
            batches = report.batches,
            failed = report.failed_batches,
            missing = report.missing(),
            "enrichment finished"
        );
        Ok(report)
    }

    /// Call the lookup until a usable response or the attempt bound. `None`
    /// means every attempt failed or came back empty.
    fn call_with_retry(
        &self,
        keys: &[CoordKey],
        batch: usize,
        calls: &mut usize,
    ) -> Result<Option<HashMap<CoordKey, f64>>, EnrichmentError> {
        let max = self.cfg.retry_max_attempts;
        for attempt in 1..=max {
            *calls += 1;
            let outcome = match self.lookup.lookup(keys) {
                Ok(map) if map.is_empty() => Attempt::Retry("empty response"),
                Ok(map) if self.all_zero(keys, &map) && attempt < max => {
                    Attempt::Retry("all-zero response")
                }
                Ok(map) => Attempt::Accept(map),
                Err(LookupError::Config(m)) => return Err(EnrichmentError::Endpoint(m)),
                Err(LookupError::Transient(m)) => {
                    debug!(batch, attempt, error = %m, "lookup failed");
                    Attempt::Retry("transient failure")
                }
            };
            match outcome {
                Attempt::Accept(map) => return Ok(Some(map)),
                Attempt::Retry(reason) => {
                    debug!(batch, attempt, max, keys = keys.len(), reason, "lookup attempt rejected");
                    if attempt < max {
                        let delay = self.cfg.backoff(attempt);
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    fn all_zero(&self, keys: &[CoordKey], map: &HashMap<CoordKey, f64>) -> bool {
        self.cfg.retry_on_all_zero && keys.len() > 1 && map.values().all(|h| *h == 0.0)
    }
}
