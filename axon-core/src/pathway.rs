//! ## axon-core::pathway
//! **Source-indexed fan-out with one delay queue per worker**
//!
//! Items (synapses) are split into contiguous blocks, one block per worker.
//! Every worker scans the full spike list on `push` and only queues the items
//! of its own block, so pushes never need a merge step. `gather` concatenates
//! the per-worker "due now" slots on the designated worker.
//!
//! ### Synchronization contract:
//! - `push`/`advance` on worker `w` touch only queue `w`
//! - `gather` must be separated from `push`/`advance` and from `peek` by a barrier
//! - the merged view is valid until the next `advance`

use std::ops::Range;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::PathwayError;
use crate::queue::{check_inputs, DelayQueue};
use crate::sync::TickContext;

/// What happens to the trailing `n % workers` items when items do not split
/// evenly across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// The trailing items belong to no worker and are never delivered.
    Drop,
    /// The last worker also takes the trailing items.
    #[default]
    LastWorker,
}

/// Item ranges assigned by [`Pathway::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPartition {
    pub per_worker: Vec<Range<usize>>,
    /// Items assigned to no worker (only non-empty under [`RemainderPolicy::Drop`]).
    pub dropped: Range<usize>,
}

impl PreparedPartition {
    /// Splits `items` into `workers` contiguous blocks of `items / workers`.
    pub fn split(items: usize, workers: usize, policy: RemainderPolicy) -> Self {
        let block = items / workers;
        let mut per_worker: Vec<Range<usize>> =
            (0..workers).map(|w| w * block..(w + 1) * block).collect();
        let covered = block * workers;
        let dropped = match policy {
            RemainderPolicy::Drop => covered..items,
            RemainderPolicy::LastWorker => {
                if let Some(last) = per_worker.last_mut() {
                    last.end = items;
                }
                items..items
            }
        };
        Self {
            per_worker,
            dropped,
        }
    }

    pub fn assigned(&self) -> usize {
        self.per_worker.iter().map(|r| r.len()).sum()
    }
}

pub struct Pathway {
    name: String,
    source_start: usize,
    source_stop: usize,
    remainder: RemainderPolicy,
    queues: Vec<Mutex<DelayQueue>>,
    merged: RwLock<Vec<usize>>,
}

impl Pathway {
    pub fn new(
        name: impl Into<String>,
        sources: Range<usize>,
        workers: usize,
        remainder: RemainderPolicy,
    ) -> Result<Self, PathwayError> {
        if workers == 0 {
            return Err(PathwayError::NoWorkers);
        }
        if sources.end < sources.start {
            return Err(PathwayError::InvalidSourceRange {
                start: sources.start,
                stop: sources.end,
            });
        }
        let name = name.into();
        debug!(pathway = %name, workers, ?sources, "constructing pathway");
        let queues = (0..workers)
            .map(|_| Mutex::new(DelayQueue::new(sources.start, sources.end)))
            .collect();
        Ok(Self {
            name,
            source_start: sources.start,
            source_stop: sources.end,
            remainder,
            queues,
            merged: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workers(&self) -> usize {
        self.queues.len()
    }

    pub fn source_range(&self) -> Range<usize> {
        self.source_start..self.source_stop
    }

    pub fn remainder_policy(&self) -> RemainderPolicy {
        self.remainder
    }

    /// Fails when a run's pool size differs from the one this pathway was built for.
    pub fn ensure_workers(&self, workers: usize) -> Result<(), PathwayError> {
        if workers == self.queues.len() {
            Ok(())
        } else {
            Err(PathwayError::WorkerCountMismatch {
                pathway: self.queues.len(),
                runtime: workers,
            })
        }
    }

    fn queue(&self, worker: usize) -> Result<&Mutex<DelayQueue>, PathwayError> {
        self.queues.get(worker).ok_or(PathwayError::UnknownWorker {
            worker,
            workers: self.queues.len(),
        })
    }

    /// Partitions items across workers and prepares every worker's queue.
    ///
    /// Inputs are validated as a whole before any queue changes. Must not run
    /// concurrently with `push`/`advance`.
    #[instrument(skip_all, fields(pathway = %self.name, items = delays.len(), dt = dt))]
    pub fn prepare(
        &self,
        delays: &[f64],
        sources: &[usize],
        dt: f64,
    ) -> Result<PreparedPartition, PathwayError> {
        check_inputs(delays, sources, 0, dt, self.source_range())?;

        let partition = PreparedPartition::split(delays.len(), self.queues.len(), self.remainder);
        for (queue, range) in self.queues.iter().zip(&partition.per_worker) {
            queue.lock().prepare(
                &delays[range.clone()],
                &sources[range.clone()],
                range.start,
                dt,
            )?;
        }
        if !partition.dropped.is_empty() {
            warn!(
                pathway = %self.name,
                dropped = partition.dropped.len(),
                "items do not split evenly across workers; remainder is never delivered"
            );
        }
        debug!(assigned = partition.assigned(), "prepared pathway");
        Ok(partition)
    }

    /// Queues the items of `worker`'s block for every spiking source.
    pub fn push(&self, worker: usize, spikes: &[usize]) -> Result<usize, PathwayError> {
        Ok(self.queue(worker)?.lock().push(spikes)?)
    }

    pub fn advance(&self, worker: usize) -> Result<(), PathwayError> {
        self.queue(worker)?.lock().advance();
        Ok(())
    }

    /// On the designated worker, merges every worker's due slot in worker
    /// order. Other workers return immediately.
    pub fn gather(&self, worker: usize) -> Result<(), PathwayError> {
        self.queue(worker)?;
        if worker != 0 {
            return Ok(());
        }
        let mut merged = self.merged.write();
        merged.clear();
        for queue in &self.queues {
            merged.extend_from_slice(queue.lock().peek());
        }
        Ok(())
    }

    /// Merged view produced by the last `gather`.
    pub fn peek(&self) -> RwLockReadGuard<'_, Vec<usize>> {
        self.merged.read()
    }

    /// `gather`, barrier, then `peek`, for use inside a binding.
    pub fn synchronized_peek(
        &self,
        ctx: &TickContext<'_>,
    ) -> Result<RwLockReadGuard<'_, Vec<usize>>, PathwayError> {
        self.ensure_workers(ctx.workers)?;
        self.gather(ctx.worker)?;
        ctx.barrier();
        Ok(self.peek())
    }

    /// Items waiting in all worker queues.
    pub fn pending(&self) -> usize {
        self.queues.iter().map(|q| q.lock().pending()).sum()
    }
}
