//! Parallel post-walk processing over contiguous chunks of the merged table.
//!
//! The table is split into balanced contiguous chunks, one per worker. Each
//! worker returns its own value; the coordinating thread collects them in
//! chunk order after every worker has finished. Workers never write to a
//! shared collection.

pub mod workload;

pub use workload::{distribute_workload, WorkloadBucket};

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::WorkerError;

/// Environment variable carrying the processor count.
pub const CORE_COUNT_ENV: &str = "NUMBER_OF_PROCESSORS";

/// Worker count for a reported core count.
///
/// Absent or at most 2 cores runs sequentially; otherwise one core is left
/// free for the coordinating thread.
pub fn worker_count(core_count: Option<usize>) -> usize {
    match core_count {
        Some(cores) if cores > 2 => cores - 1,
        _ => 1,
    }
}

/// Core count from the raw [`CORE_COUNT_ENV`] value. Unparsable values
/// count as absent.
pub fn parse_core_count(value: Option<&str>) -> Option<usize> {
    value.and_then(|v| v.trim().parse::<usize>().ok())
}

/// Worker count from [`CORE_COUNT_ENV`]. Call once at startup.
pub fn worker_count_from_env() -> usize {
    let value = std::env::var(CORE_COUNT_ENV).ok();
    worker_count(parse_core_count(value.as_deref()))
}

/// Split `len` items into at most `chunks` contiguous ranges whose sizes
/// differ by at most one. Never produces empty ranges.
pub fn chunk_ranges(len: usize, chunks: usize) -> Vec<Range<usize>> {
    if len == 0 || chunks == 0 {
        return Vec::new();
    }
    let count = chunks.min(len);
    let base = len / count;
    let extra = len % count;

    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Cooperative stop signal shared between the caller and the chunker.
///
/// Chunks that have not started when the token is cancelled are reported as
/// [`ChunkOutcome::Cancelled`]. Running chunks may poll the token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How one chunk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome<R> {
    Completed(R),
    Failed(WorkerError),
    Cancelled,
}

/// Result of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport<R> {
    pub index: usize,
    pub range: Range<usize>,
    pub outcome: ChunkOutcome<R>,
}

/// Runs a worker over contiguous chunks on a dedicated thread pool.
#[derive(Debug, Clone)]
pub struct WorkChunker {
    workers: usize,
    token: CancellationToken,
}

impl WorkChunker {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `worker` over every chunk of `items` and return one report per
    /// chunk, in chunk order. A panicking worker fails its chunk only.
    pub fn run<T, R, F>(&self, items: &[T], worker: F) -> Vec<ChunkReport<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> R + Sync,
    {
        let ranges = chunk_ranges(items.len(), self.workers);

        let run_chunk = |(index, range): (usize, Range<usize>)| -> ChunkReport<R> {
            if self.token.is_cancelled() {
                debug!(chunk = index, "chunk cancelled before start");
                return ChunkReport {
                    index,
                    range,
                    outcome: ChunkOutcome::Cancelled,
                };
            }

            debug!(chunk = index, start = range.start, end = range.end, "chunk started");
            let slice = &items[range.clone()];
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| worker(slice))) {
                Ok(value) => ChunkOutcome::Completed(value),
                Err(payload) => {
                    let error = WorkerError {
                        index,
                        start: range.start,
                        end: range.end,
                        reason: panic_message(&*payload),
                    };
                    warn!(error = %error, "chunk failed");
                    ChunkOutcome::Failed(error)
                }
            };
            ChunkReport {
                index,
                range,
                outcome,
            }
        };

        if self.workers == 1 || ranges.len() <= 1 {
            return ranges.into_iter().enumerate().map(run_chunk).collect();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("nestsweep-chunk-{}", i))
            .build()
        {
            Ok(pool) => pool.install(|| ranges.into_par_iter().enumerate().map(&run_chunk).collect()),
            Err(e) => {
                warn!(error = %e, "thread pool unavailable, running chunks sequentially");
                ranges.into_iter().enumerate().map(run_chunk).collect()
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
