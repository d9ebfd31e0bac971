//! Data-parallel accelerator handle.
//!
//! A cheap, clonable value wrapping an optional rayon pool. `detect` probes
//! the host once; callers cache the result and hand clones to dispatchers.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

#[derive(Clone, Debug, Default)]
pub struct Accelerator {
    pool: Option<Arc<ThreadPool>>,
}

impl Accelerator {
    /// Probe available parallelism and build a pool when more than one
    /// hardware thread is usable. Never fails: an unusable host yields a
    /// disabled accelerator.
    pub fn detect() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if threads < 2 {
            info!(threads, "accelerator unavailable; sequential projection");
            return Self::disabled();
        }
        let accel = Self::with_threads(threads);
        if accel.is_available() {
            info!(threads, "accelerator available");
        }
        accel
    }

    pub fn disabled() -> Self {
        Self { pool: None }
    }

    /// Pool with a fixed thread count; disabled if the pool cannot be built.
    pub fn with_threads(threads: usize) -> Self {
        match ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("diffh-proj-{i}"))
            .build()
        {
            Ok(pool) => Self {
                pool: Some(Arc::new(pool)),
            },
            Err(e) => {
                warn!(error = %e, "failed to build accelerator pool");
                Self::disabled()
            }
        }
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    pub(crate) fn pool(&self) -> Option<&ThreadPool> {
        self.pool.as_deref()
    }
}
