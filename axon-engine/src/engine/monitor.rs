//! Recording bindings. All of them write on the designated worker only, so
//! their records do not depend on the pool size.

use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use axon_core::sync::TickContext;

use super::binding::Binding;
use super::bindings::SpikeSpace;
use super::error::BindingError;

/// Records `(index - start, t)` for every spike of a sub-range of a population.
pub struct SpikeMonitor {
    name: String,
    spikes: Arc<SpikeSpace>,
    range: Range<usize>,
    records: Mutex<Vec<(usize, f64)>>,
}

impl SpikeMonitor {
    pub fn new(name: impl Into<String>, spikes: Arc<SpikeSpace>, range: Range<usize>) -> Self {
        Self {
            name: name.into(),
            spikes,
            range,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Monitors the whole population.
    pub fn all(name: impl Into<String>, spikes: Arc<SpikeSpace>) -> Self {
        let size = spikes.size();
        Self::new(name, spikes, 0..size)
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn records(&self) -> Vec<(usize, f64)> {
        self.records.lock().clone()
    }
}

impl Binding for SpikeMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError> {
        if !ctx.is_designated() {
            return Ok(());
        }
        let spikes = self.spikes.read();
        let lo = spikes.partition_point(|&i| i < self.range.start);
        let hi = spikes.partition_point(|&i| i < self.range.end);
        let mut records = self.records.lock();
        records.extend(spikes[lo..hi].iter().map(|&i| (i - self.range.start, ctx.t)));
        Ok(())
    }
}

/// Population rate per tick: `spikes / dt / size`, in Hz.
pub struct RateMonitor {
    name: String,
    spikes: Arc<SpikeSpace>,
    records: Mutex<Vec<(f64, f64)>>,
}

impl RateMonitor {
    pub fn new(name: impl Into<String>, spikes: Arc<SpikeSpace>) -> Self {
        Self {
            name: name.into(),
            spikes,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<(f64, f64)> {
        self.records.lock().clone()
    }

    /// Mean of the recorded rates, `0.0` before any tick.
    pub fn mean_rate(&self) -> f64 {
        let records = self.records.lock();
        if records.is_empty() {
            return 0.0;
        }
        records.iter().map(|(_, r)| r).sum::<f64>() / records.len() as f64
    }
}

impl Binding for RateMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError> {
        if !ctx.is_designated() {
            return Ok(());
        }
        let size = self.spikes.size();
        let rate = if size == 0 {
            0.0
        } else {
            self.spikes.read().len() as f64 / ctx.dt / size as f64
        };
        self.records.lock().push((ctx.t, rate));
        Ok(())
    }
}

/// Samples arbitrary state once per tick of its clock.
pub struct StateMonitor<F> {
    name: String,
    sample: F,
    records: Mutex<Vec<(f64, Vec<f64>)>>,
}

impl<F> StateMonitor<F>
where
    F: Fn() -> Vec<f64> + Send + Sync,
{
    pub fn new(name: impl Into<String>, sample: F) -> Self {
        Self {
            name: name.into(),
            sample,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<(f64, Vec<f64>)> {
        self.records.lock().clone()
    }
}

impl<F> Binding for StateMonitor<F>
where
    F: Fn() -> Vec<f64> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError> {
        if ctx.is_designated() {
            let values = (self.sample)();
            self.records.lock().push((ctx.t, values));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::sync::NoopRendezvous;

    #[test]
    fn spike_monitor_records_relative_indices() {
        let space = Arc::new(SpikeSpace::new(20));
        let monitor = SpikeMonitor::new("sm", Arc::clone(&space), 5..10);

        space.publish(vec![2, 5, 9, 12]);
        monitor.execute(&TickContext::solo(0.5, 0.1, 5)).unwrap();
        space.publish(vec![7]);
        monitor.execute(&TickContext::solo(0.6, 0.1, 6)).unwrap();

        assert_eq!(monitor.records(), vec![(0, 0.5), (4, 0.5), (2, 0.6)]);
        assert_eq!(monitor.count(), 3);
    }

    #[test]
    fn monitors_ignore_other_workers() {
        let space = Arc::new(SpikeSpace::new(4));
        space.publish(vec![0, 1]);
        let spikes = SpikeMonitor::all("sm", Arc::clone(&space));
        let rate = RateMonitor::new("rm", Arc::clone(&space));
        let noop = NoopRendezvous;
        let ctx = TickContext::new(1, 2, 0.0, 0.5, 0, &noop);
        spikes.execute(&ctx).unwrap();
        rate.execute(&ctx).unwrap();
        assert_eq!(spikes.count(), 0);
        assert!(rate.records().is_empty());
    }

    #[test]
    fn rate_is_spikes_per_second_per_neuron() {
        let space = Arc::new(SpikeSpace::new(4));
        let rate = RateMonitor::new("rm", Arc::clone(&space));
        space.publish(vec![0, 3]);
        rate.execute(&TickContext::solo(0.0, 0.5, 0)).unwrap();
        space.publish(Vec::new());
        rate.execute(&TickContext::solo(0.5, 0.5, 1)).unwrap();
        assert_eq!(rate.records(), vec![(0.0, 1.0), (0.5, 0.0)]);
        assert_eq!(rate.mean_rate(), 0.5);
    }

    #[test]
    fn state_monitor_samples_each_tick() {
        let monitor = StateMonitor::new("state", || vec![1.0, 2.0]);
        monitor.execute(&TickContext::solo(0.25, 0.25, 1)).unwrap();
        assert_eq!(monitor.records(), vec![(0.25, vec![1.0, 2.0])]);
    }
}
