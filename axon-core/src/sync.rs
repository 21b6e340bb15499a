//! ## axon-core::sync
//! **Worker rendezvous and per-tick execution context**
//!
//! Barriers are explicit values instead of a property of a parallel region,
//! so a single worker can satisfy the same contract with [`NoopRendezvous`].

use std::ops::Range;
use std::sync::Barrier;

/// Rendezvous point shared by every worker of a run.
pub trait Rendezvous: Send + Sync {
    /// Blocks until every worker of the pool has called `wait`.
    fn wait(&self);
}

/// Rendezvous for a pool of exactly one worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRendezvous;

impl Rendezvous for NoopRendezvous {
    #[inline]
    fn wait(&self) {}
}

/// Reusable thread barrier for a fixed number of workers.
#[derive(Debug)]
pub struct ThreadBarrier {
    inner: Barrier,
}

impl ThreadBarrier {
    pub fn new(workers: usize) -> Self {
        Self {
            inner: Barrier::new(workers),
        }
    }
}

impl Rendezvous for ThreadBarrier {
    fn wait(&self) {
        self.inner.wait();
    }
}

/// Picks the rendezvous matching a pool size.
pub fn rendezvous_for(workers: usize) -> Box<dyn Rendezvous> {
    if workers <= 1 {
        Box::new(NoopRendezvous)
    } else {
        Box::new(ThreadBarrier::new(workers))
    }
}

/// What a binding sees when it executes on one worker.
pub struct TickContext<'a> {
    /// Index of the executing worker, `0..workers`.
    pub worker: usize,
    /// Size of the worker pool for this run.
    pub workers: usize,
    /// Current (minimum) simulation time.
    pub t: f64,
    /// Step size of the clock driving the executing binding.
    pub dt: f64,
    /// Scheduler iteration counter, starting at 0 for each run.
    pub step: u64,
    rendezvous: &'a dyn Rendezvous,
}

impl<'a> TickContext<'a> {
    pub fn new(
        worker: usize,
        workers: usize,
        t: f64,
        dt: f64,
        step: u64,
        rendezvous: &'a dyn Rendezvous,
    ) -> Self {
        Self {
            worker,
            workers,
            t,
            dt,
            step,
            rendezvous,
        }
    }

    /// Single-worker context with a no-op rendezvous.
    pub fn solo(t: f64, dt: f64, step: u64) -> TickContext<'static> {
        TickContext::new(0, 1, t, dt, step, &NoopRendezvous)
    }

    /// Waits until every worker reaches the same point.
    #[inline]
    pub fn barrier(&self) {
        self.rendezvous.wait();
    }

    /// Worker 0 performs single-writer sections.
    #[inline]
    pub fn is_designated(&self) -> bool {
        self.worker == 0
    }

    pub fn rendezvous(&self) -> &'a dyn Rendezvous {
        self.rendezvous
    }

    /// Contiguous share of `0..len` handled by this worker.
    pub fn chunk(&self, len: usize) -> Range<usize> {
        let size = len.div_ceil(self.workers.max(1));
        let start = (self.worker * size).min(len);
        let end = (start + size).min(len);
        start..end
    }
}
