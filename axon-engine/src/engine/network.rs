//! ## axon-engine::network
//! **Multi-clock scheduler driving bindings on a fixed worker pool**
//!
//! Each tick, the clocks sharing the minimum time (within `EPSILON`) are
//! "current"; every binding attached to a current clock runs on all workers
//! in registration order, separated by barriers. Worker 0 then advances the
//! current clocks and publishes the next tick plan.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, trace};

use axon_config::RuntimeConfig;
use axon_core::sync::{rendezvous_for, Rendezvous, TickContext};
use axon_core::time::{same_time, Clock};
use axon_telemetry::RunMetrics;

use super::binding::Binding;
use super::error::{BindingError, SimulationError};

/// Handle returned by [`Network::add_clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId(usize);

impl ClockId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Outcome of one [`Network::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub start: f64,
    pub end: f64,
    /// Scheduler iterations executed.
    pub ticks: u64,
    /// Binding executions, counted once per binding per tick.
    pub executions: u64,
}

struct Registration {
    clock: ClockId,
    binding: Arc<dyn Binding>,
}

/// What every worker executes during one tick.
#[derive(Debug)]
struct TickPlan {
    t: f64,
    step: u64,
    running: bool,
    /// Indices into the active clock list.
    current: Vec<usize>,
    /// Due bindings in registration order, with their clock's step.
    due: Vec<(usize, f64)>,
}

pub struct Network {
    workers: usize,
    clocks: Vec<Clock>,
    bindings: Vec<Registration>,
    metrics: Option<Arc<RunMetrics>>,
}

impl Network {
    /// Creates a scheduler for a pool of `workers` (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            clocks: Vec::new(),
            bindings: Vec::new(),
            metrics: None,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.workers)
    }

    /// Records counters and run durations into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn add_clock(&mut self, clock: Clock) -> ClockId {
        self.clocks.push(clock);
        ClockId(self.clocks.len() - 1)
    }

    pub fn clock(&self, id: ClockId) -> Option<&Clock> {
        self.clocks.get(id.0)
    }

    /// Mutable access between runs, e.g. to change a step size.
    pub fn clock_mut(&mut self, id: ClockId) -> Option<&mut Clock> {
        self.clocks.get_mut(id.0)
    }

    /// Attaches `binding` to `clock`. Bindings run in the order they were added.
    pub fn add(&mut self, clock: ClockId, binding: Arc<dyn Binding>) -> Result<(), SimulationError> {
        if clock.0 >= self.clocks.len() {
            return Err(SimulationError::UnknownClock(clock.0));
        }
        debug!(binding = binding.name(), clock = self.clocks[clock.0].name(), "binding added");
        self.bindings.push(Registration { clock, binding });
        Ok(())
    }

    /// Removes every binding. Clocks keep their time.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn bindings(&self) -> usize {
        self.bindings.len()
    }

    /// Earliest time among all clocks, `0.0` without clocks.
    pub fn t(&self) -> f64 {
        self.clocks
            .iter()
            .map(Clock::t)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Clocks whose time equals the minimum within `EPSILON`.
    pub fn minimum_time_clocks(&self) -> Vec<ClockId> {
        let all: Vec<usize> = (0..self.clocks.len()).collect();
        current_clocks(&self.clocks, &all)
            .into_iter()
            .map(ClockId)
            .collect()
    }

    /// Advances simulated time by `duration`.
    ///
    /// Only clocks with at least one binding take part. On success every
    /// participating clock ends exactly at `start + duration`; after a failed
    /// run clocks stay where the failing tick left them.
    #[instrument(skip(self), fields(workers = self.workers, bindings = self.bindings.len()))]
    pub fn run(&mut self, duration: f64) -> Result<RunSummary, SimulationError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimulationError::InvalidDuration(duration));
        }
        if self.bindings.is_empty() {
            return Err(SimulationError::NoBindings);
        }
        if let Some(r) = self.bindings.iter().find(|r| r.clock.0 >= self.clocks.len()) {
            return Err(SimulationError::UnknownClock(r.clock.0));
        }

        let mut active: Vec<usize> = self.bindings.iter().map(|r| r.clock.0).collect();
        active.sort_unstable();
        active.dedup();

        let start = active
            .iter()
            .map(|&c| self.clocks[c].t())
            .fold(f64::INFINITY, f64::min);
        let end = start + duration;
        for &c in &active {
            self.clocks[c].set_interval(start, end);
        }
        info!(start, end, clocks = active.len(), "starting run");
        let wall = Instant::now();

        let clocks = std::mem::take(&mut self.clocks);
        let first = plan_tick(&clocks, &active, &self.bindings, 0);
        let state = RunState {
            bindings: &self.bindings,
            active,
            workers: self.workers,
            clocks: Mutex::new(clocks),
            plan: RwLock::new(Arc::new(first)),
            rendezvous: rendezvous_for(self.workers),
            failed_at: AtomicUsize::new(NO_FAILURE),
            failure: Mutex::new(None),
            ticks: AtomicU64::new(0),
            executions: AtomicU64::new(0),
        };

        let pool = if self.workers == 1 {
            state.worker_loop(0);
            Ok(())
        } else {
            state.run_pool()
        };

        let RunState {
            active,
            clocks,
            failure,
            ticks,
            executions,
            ..
        } = state;
        self.clocks = clocks.into_inner();
        pool?;
        if let Some(err) = failure.into_inner() {
            error!(error = %err, "run aborted");
            return Err(err);
        }

        for &c in &active {
            self.clocks[c].snap_to_end();
        }
        let summary = RunSummary {
            start,
            end,
            ticks: ticks.into_inner(),
            executions: executions.into_inner(),
        };
        let elapsed = wall.elapsed().as_secs_f64();
        if let Some(metrics) = &self.metrics {
            metrics.ticks.inc_by(summary.ticks);
            metrics.binding_executions.inc_by(summary.executions);
            metrics.run_seconds.observe(elapsed);
        }
        info!(
            ticks = summary.ticks,
            executions = summary.executions,
            elapsed_s = elapsed,
            "run finished"
        );
        Ok(summary)
    }
}

/// Active clock indices sharing the minimum time.
fn current_clocks(clocks: &[Clock], active: &[usize]) -> Vec<usize> {
    let t_min = active
        .iter()
        .map(|&c| clocks[c].t())
        .fold(f64::INFINITY, f64::min);
    active
        .iter()
        .copied()
        .filter(|&c| same_time(clocks[c].t(), t_min))
        .collect()
}

fn plan_tick(clocks: &[Clock], active: &[usize], bindings: &[Registration], step: u64) -> TickPlan {
    let current = current_clocks(clocks, active);
    let (t, running) = current
        .first()
        .map(|&c| (clocks[c].t(), clocks[c].running()))
        .unwrap_or((0.0, false));
    let due = bindings
        .iter()
        .enumerate()
        .filter(|(_, r)| current.contains(&r.clock.0))
        .map(|(i, r)| (i, clocks[r.clock.0].dt()))
        .collect();
    TickPlan {
        t,
        step,
        running,
        current,
        due,
    }
}

const NO_FAILURE: usize = usize::MAX;

/// State shared by the workers of one run.
struct RunState<'n> {
    bindings: &'n [Registration],
    active: Vec<usize>,
    workers: usize,
    clocks: Mutex<Vec<Clock>>,
    plan: RwLock<Arc<TickPlan>>,
    rendezvous: Box<dyn Rendezvous>,
    /// Position in the current tick's due list of the first failed binding.
    failed_at: AtomicUsize,
    failure: Mutex<Option<SimulationError>>,
    ticks: AtomicU64,
    executions: AtomicU64,
}

impl RunState<'_> {
    fn run_pool(&self) -> Result<(), SimulationError> {
        // Threads wait for a go signal so a failed spawn never leaves the
        // others blocked on a barrier sized for the full pool.
        let (go, gate) = channel::bounded::<bool>(self.workers);
        crossbeam::thread::scope(|scope| {
            let mut spawn_error = None;
            let mut spawned = 0;
            for worker in 0..self.workers {
                let gate = gate.clone();
                let result = scope
                    .builder()
                    .name(format!("axon-worker-{worker}"))
                    .spawn(move |_| {
                        if let Ok(true) = gate.recv() {
                            self.worker_loop(worker);
                        }
                    });
                match result {
                    Ok(_) => spawned += 1,
                    Err(err) => {
                        spawn_error = Some(err);
                        break;
                    }
                }
            }
            let start = spawn_error.is_none();
            for _ in 0..spawned {
                let _ = go.send(start);
            }
            match spawn_error {
                Some(err) => Err(SimulationError::WorkerPanicked(format!(
                    "failed to spawn worker: {err}"
                ))),
                None => Ok(()),
            }
        })
        .map_err(|_| SimulationError::WorkerPanicked("worker thread panicked".into()))?
    }

    fn worker_loop(&self, worker: usize) {
        loop {
            let plan = Arc::clone(&*self.plan.read());
            if !plan.running {
                return;
            }
            for (position, &(index, dt)) in plan.due.iter().enumerate() {
                self.rendezvous.wait();
                // A failure at an earlier position was recorded before this
                // barrier, so every worker skips alike and stays on the
                // barrier schedule. Failures at `position` itself may still
                // be in flight and are only acted on after the tick.
                if self.failed_at.load(Ordering::Acquire) < position {
                    continue;
                }
                let registration = &self.bindings[index];
                let ctx = TickContext::new(
                    worker,
                    self.workers,
                    plan.t,
                    dt,
                    plan.step,
                    self.rendezvous.as_ref(),
                );
                match execute(registration.binding.as_ref(), &ctx) {
                    Ok(()) if worker == 0 => {
                        self.executions.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(()) => {}
                    Err(source) => {
                        self.fail(position, registration.binding.name(), plan.t, source)
                    }
                }
            }
            self.rendezvous.wait();
            // No binding runs between this barrier and the next, so every
            // worker sees the same value here.
            if self.failed_at.load(Ordering::Acquire) != NO_FAILURE {
                return;
            }
            if worker == 0 {
                self.advance(&plan);
            }
            self.rendezvous.wait();
        }
    }

    /// Designated-worker section between two barriers.
    fn advance(&self, plan: &TickPlan) {
        let mut clocks = self.clocks.lock();
        for &c in &plan.current {
            clocks[c].advance();
        }
        let next = plan_tick(&clocks, &self.active, self.bindings, plan.step + 1);
        trace!(t = plan.t, due = plan.due.len(), next_t = next.t, "tick");
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.plan.write() = Arc::new(next);
    }

    fn fail(&self, position: usize, binding: &str, t: f64, source: BindingError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(SimulationError::Binding {
                binding: binding.to_string(),
                t,
                source,
            });
        }
        self.failed_at.fetch_min(position, Ordering::AcqRel);
    }
}

/// Runs one binding, turning a panic into an error so the other workers are
/// released at the next barrier.
fn execute(binding: &dyn Binding, ctx: &TickContext<'_>) -> Result<(), BindingError> {
    panic::catch_unwind(AssertUnwindSafe(|| binding.execute(ctx))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(BindingError::Panicked(message))
    })
}
