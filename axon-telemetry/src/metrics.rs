//! ## axon-telemetry::metrics
//! **Prometheus counters for scheduler runs**

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

use crate::TelemetryError;

#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub registry: Registry,
    pub ticks: IntCounter,
    pub binding_executions: IntCounter,
    pub spikes_pushed: IntCounter,
    pub spikes_delivered: IntCounter,
    pub run_seconds: Histogram,
}

impl RunMetrics {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let ticks = IntCounter::new("axon_ticks_total", "Scheduler iterations executed")?;
        let binding_executions = IntCounter::new(
            "axon_binding_executions_total",
            "Bindings executed across all ticks",
        )?;
        let spikes_pushed =
            IntCounter::new("axon_spikes_pushed_total", "Items queued on pathways")?;
        let spikes_delivered = IntCounter::new(
            "axon_spikes_delivered_total",
            "Items delivered from pathways",
        )?;
        let run_seconds = Histogram::with_opts(
            HistogramOpts::new("axon_run_seconds", "Wall-clock duration of Network::run")
                .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0, 100.0]),
        )?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(binding_executions.clone()))?;
        registry.register(Box::new(spikes_pushed.clone()))?;
        registry.register(Box::new(spikes_delivered.clone()))?;
        registry.register(Box::new(run_seconds.clone()))?;

        Ok(Self {
            registry,
            ticks,
            binding_executions,
            spikes_pushed,
            spikes_delivered,
            run_seconds,
        })
    }

    /// Renders the registry in the Prometheus text format.
    pub fn gather_metrics(&self) -> Result<String, TelemetryError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
