//! Chunked, cancellable rotor computation on a shared worker pool.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use tracing::trace;

use super::cache::{Lookup, RotorStateCache};
use super::frequency::FrequencyStrategy;
use crate::function::PeriodicFunction;

pub const DEFAULT_CHUNK_SIZE: usize = 80;

/// Cooperative cancellation flag shared between a requester and its workers.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct PoolError(rayon::ThreadPoolBuildError);

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to build rotor worker pool: {}", self.0)
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

static SHARED_POOL: OnceCell<WorkerPool> = OnceCell::new();

/// Bounded pool executing chunk tasks. Clones share the same threads.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// `threads == 0` sizes the pool to the available parallelism.
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rotor-worker-{i}"))
            .build()
            .map_err(PoolError)?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Process-wide pool used by every manager. The thread count only applies
    /// to the first call.
    pub fn shared(threads: usize) -> Result<Self, PoolError> {
        SHARED_POOL
            .get_or_try_init(|| WorkerPool::new(threads))
            .cloned()
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

/// Consecutive sub-ranges of at most `chunk_size` indices.
pub fn chunk_ranges(range: Range<usize>, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(range.len().div_ceil(chunk_size));
    let mut start = range.start;
    while start < range.end {
        let end = (start + chunk_size).min(range.end);
        chunks.push(start..end);
        start = end;
    }
    chunks
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub requested: usize,
    pub computed: usize,
    pub hits: usize,
    pub cancelled: bool,
}

#[derive(Clone, Debug)]
pub struct BatchLoader {
    pool: WorkerPool,
    chunk_size: usize,
}

impl BatchLoader {
    pub fn new(pool: WorkerPool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fills the cache for every index in `range`, with frequencies taken from
    /// `strategy` at `total`. Blocks the calling thread until every chunk has
    /// finished or observed `is_cancelled`.
    pub fn load(
        &self,
        cache: &RotorStateCache,
        function: &dyn PeriodicFunction,
        strategy: &FrequencyStrategy,
        range: Range<usize>,
        total: usize,
        is_cancelled: &(dyn Fn() -> bool + Sync),
    ) -> BatchOutcome {
        let requested = range.len();
        let chunks = chunk_ranges(range, self.chunk_size);
        let computed = AtomicUsize::new(0);
        let hits = AtomicUsize::new(0);
        let abandoned = AtomicBool::new(false);

        {
            let computed = &computed;
            let hits = &hits;
            let abandoned = &abandoned;
            self.pool.pool.scope(|scope| {
                for chunk in chunks {
                    scope.spawn(move |_| {
                        for index in chunk.clone() {
                            if is_cancelled() {
                                abandoned.store(true, Ordering::Relaxed);
                                trace!(chunk = ?chunk, index, "chunk cancelled");
                                return;
                            }
                            let frequency = strategy.frequency(index, total);
                            match cache.get_or_compute(function, frequency).1 {
                                Lookup::Hit => hits.fetch_add(1, Ordering::Relaxed),
                                Lookup::Computed => computed.fetch_add(1, Ordering::Relaxed),
                            };
                        }
                        trace!(chunk = ?chunk, "chunk done");
                    });
                }
            });
        }

        BatchOutcome {
            requested,
            computed: computed.into_inner(),
            hits: hits.into_inner(),
            cancelled: abandoned.into_inner(),
        }
    }
}
