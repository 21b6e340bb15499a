//! ## axon-core::time
//! **Per-rate-group simulation clocks**
//!
//! Every clock steps independently with its own `dt`. The scheduler compares
//! clocks with an absolute tolerance of [`EPSILON`] so that logically equal
//! rates that drift by a few ulps still tick together.
//!
//! ### Limitations:
//! - Time is accumulated with `t += dt`. Drift beyond `EPSILON` over very long
//!   runs is not corrected.

use crate::error::ClockError;

/// Absolute tolerance used to decide whether two clock times coincide.
pub const EPSILON: f64 = 1e-14;

/// Returns `true` when `a` and `b` are the same instant for scheduling purposes.
#[inline]
pub fn same_time(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= EPSILON
}

/// Simulation clock for one rate group.
#[derive(Debug, Clone)]
pub struct Clock {
    name: String,
    dt: f64,
    t: f64,
    start: f64,
    end: f64,
}

impl Clock {
    /// Creates a clock at `t = 0` stepping by `dt`.
    ///
    /// A zero, negative or non-finite step would make the scheduler loop
    /// forever, so it is rejected here.
    pub fn new(name: impl Into<String>, dt: f64) -> Result<Self, ClockError> {
        let name = name.into();
        check_step(&name, dt)?;
        Ok(Self {
            name,
            dt,
            t: 0.0,
            start: 0.0,
            end: 0.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn t(&self) -> f64 {
        self.t
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Start and end of the current run window.
    pub fn interval(&self) -> (f64, f64) {
        (self.start, self.end)
    }

    /// Changes the step size between runs.
    pub fn set_dt(&mut self, dt: f64) -> Result<(), ClockError> {
        check_step(&self.name, dt)?;
        self.dt = dt;
        Ok(())
    }

    /// Records the run window `[start, end)`.
    ///
    /// A clock that is behind `start` (e.g. registered after earlier runs)
    /// catches up to it; time never moves backwards.
    pub fn set_interval(&mut self, start: f64, end: f64) {
        self.start = start;
        self.end = end;
        if self.t < start {
            self.t = start;
        }
    }

    /// `true` while the clock has not reached the end of its window.
    #[inline]
    pub fn running(&self) -> bool {
        self.t < self.end - EPSILON
    }

    #[inline]
    pub fn advance(&mut self) {
        self.t += self.dt;
    }

    /// Sets the clock to the end of its run window, rewinding an overshoot
    /// left by the last `advance`.
    pub fn snap_to_end(&mut self) {
        self.t = self.end;
    }
}

fn check_step(name: &str, dt: f64) -> Result<(), ClockError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(ClockError::InvalidStep {
            name: name.to_string(),
            dt,
        })
    }
}
