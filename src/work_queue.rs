//! Bounded-parallelism dispatcher for independent encode operations.
//!
//! Setup and encryption produce many mutually independent encodings; a
//! fixed-size worker pool runs them concurrently while the enclosing call
//! stays synchronous. Plaintexts and blinding factors are drawn on the
//! calling thread before dispatch, so the RNG is never shared.

use crate::backend::GradedBackend;
use crate::error::MifeError;
use crate::index_set::IndexSet;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// One encode operation: a plaintext vector at an index set.
pub(crate) struct EncodeJob {
    pub ix: IndexSet,
    pub values: Vec<u64>,
}

/// Shared progress counter for one setup/encrypt call.
pub(crate) struct Progress {
    done: AtomicUsize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { done: AtomicUsize::new(0), total }
    }

    pub fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(done, total = self.total, "encode");
    }
}

/// Fixed-size worker pool over a shared job queue.
pub struct WorkQueue {
    pool: rayon::ThreadPool,
}

impl WorkQueue {
    /// Build a pool of `nthreads` workers; 0 means one per core.
    pub fn new(nthreads: usize) -> Result<Self, MifeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nthreads)
            .build()
            .map_err(|e| MifeError::invalid(format!("worker pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Run a closure inside the pool (decryption's parallel output loop).
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }

    /// Encode every job in parallel, preserving order. Any failure aborts the
    /// whole batch; partial results are dropped.
    pub(crate) fn encode_all<B: GradedBackend>(
        &self,
        sk: &B::SecretKey,
        jobs: Vec<EncodeJob>,
        progress: &Progress,
    ) -> Result<Vec<B::Encoding>, MifeError> {
        self.pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    let enc = B::encode(sk, &job.ix, &job.values)?;
                    progress.tick();
                    Ok(enc)
                })
                .collect()
        })
    }
}
