//! ## axon-simulator::scenario
//! **Poisson sources driving a delayed pathway onto target counters**
//!
//! Two clocks take part: the source clock drives spike generation,
//! propagation and spike/rate monitoring; the slower monitor clock samples
//! the cumulative number of deliveries per target. A phase may change the
//! source step, which re-prepares the pathway and remaps in-flight spikes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use axon_config::{RuntimeConfig, ScenarioConfig};
use axon_core::pathway::Pathway;
use axon_core::time::Clock;
use axon_engine::{
    ClockId, DeliverSpikes, Network, PushSpikes, RateMonitor, SpikeMonitor, StateMonitor,
};
use axon_telemetry::{RunLogger, RunMetrics};

use crate::error::ScenarioError;
use crate::poisson::PoissonGroup;
use crate::report::{PhaseReport, ScenarioReport};

/// Random source-to-target connections with per-synapse delays.
#[derive(Debug, Clone, PartialEq)]
pub struct Connectivity {
    pub sources: Vec<usize>,
    pub targets: Vec<usize>,
    pub delays: Vec<f64>,
}

impl Connectivity {
    /// Connects every (source, target) pair with probability
    /// `connection_probability`, delays uniform in `[min_delay, max_delay]`.
    pub fn random(config: &ScenarioConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let p = config.connection_probability.clamp(0.0, 1.0);
        let mut sources = Vec::new();
        let mut targets = Vec::new();
        let mut delays = Vec::new();
        for source in 0..config.sources {
            for target in 0..config.targets {
                if !rng.random_bool(p) {
                    continue;
                }
                let delay = if config.max_delay > config.min_delay {
                    rng.random_range(config.min_delay..=config.max_delay)
                } else {
                    config.min_delay
                };
                sources.push(source);
                targets.push(target);
                delays.push(delay);
            }
        }
        Self {
            sources,
            targets,
            delays,
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

pub struct Scenario {
    config: ScenarioConfig,
    network: Network,
    source_clock: ClockId,
    connectivity: Arc<Connectivity>,
    pathway: Arc<Pathway>,
    push: Arc<PushSpikes>,
    spike_monitor: Arc<SpikeMonitor>,
    rate_monitor: Arc<RateMonitor>,
    deliveries: Arc<Vec<AtomicU64>>,
    samples: Arc<StateMonitor<Box<dyn Fn() -> Vec<f64> + Send + Sync>>>,
    dropped: usize,
    metrics: Option<Arc<RunMetrics>>,
}

impl Scenario {
    /// Builds the network for `config` on a pool sized by `runtime`.
    pub fn build(config: &ScenarioConfig, runtime: &RuntimeConfig) -> Result<Self, ScenarioError> {
        if config.phases.is_empty() {
            return Err(ScenarioError::Invalid("at least one phase is required".into()));
        }
        let connectivity = Arc::new(Connectivity::random(config));
        info!(
            sources = config.sources,
            targets = config.targets,
            synapses = connectivity.len(),
            workers = runtime.workers,
            "building scenario"
        );

        let mut network = Network::from_config(runtime);
        let source_clock = network.add_clock(Clock::new("source", config.dt)?);
        let monitor_clock = network.add_clock(Clock::new("monitor", config.monitor_dt)?);

        let group = Arc::new(PoissonGroup::new(
            "poisson",
            config.sources,
            config.firing_rate_hz,
            config.seed.wrapping_add(1),
        ));
        let spikes = group.spikes();

        let pathway = Arc::new(Pathway::new(
            "synapses",
            0..config.sources,
            runtime.workers,
            runtime.remainder_policy,
        )?);
        let partition = pathway.prepare(&connectivity.delays, &connectivity.sources, config.dt)?;

        let deliveries: Arc<Vec<AtomicU64>> =
            Arc::new((0..config.targets).map(|_| AtomicU64::new(0)).collect());
        let push = Arc::new(PushSpikes::new(Arc::clone(&pathway), Arc::clone(&spikes)));
        let deliver = {
            let deliveries = Arc::clone(&deliveries);
            let connectivity = Arc::clone(&connectivity);
            DeliverSpikes::new(Arc::clone(&pathway), move |item, _| {
                deliveries[connectivity.targets[item]].fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        };
        let spike_monitor = Arc::new(SpikeMonitor::all("spikes", Arc::clone(&spikes)));
        let rate_monitor = Arc::new(RateMonitor::new("rate", Arc::clone(&spikes)));
        let sample: Box<dyn Fn() -> Vec<f64> + Send + Sync> = {
            let deliveries = Arc::clone(&deliveries);
            Box::new(move || {
                deliveries
                    .iter()
                    .map(|c| c.load(Ordering::Relaxed) as f64)
                    .collect()
            })
        };
        let samples = Arc::new(StateMonitor::new("deliveries", sample));

        network.add(source_clock, group)?;
        network.add(source_clock, push.clone())?;
        network.add(source_clock, Arc::new(deliver))?;
        network.add(source_clock, spike_monitor.clone())?;
        network.add(source_clock, rate_monitor.clone())?;
        network.add(monitor_clock, samples.clone())?;

        Ok(Self {
            config: config.clone(),
            network,
            source_clock,
            connectivity,
            pathway,
            push,
            spike_monitor,
            rate_monitor,
            deliveries,
            samples,
            dropped: partition.dropped.len(),
            metrics: None,
        })
    }

    /// Records run counters into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.network = self.network.with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Executes every phase in order and summarizes the whole scenario.
    pub fn run(&mut self) -> Result<ScenarioReport, ScenarioError> {
        let workers = self.network.workers();
        let mut phases = Vec::with_capacity(self.config.phases.len());

        for (index, phase) in self.config.phases.clone().into_iter().enumerate() {
            let span = RunLogger::phase_span(index, phase.duration, workers);
            let _enter = span.enter();

            if let Some(dt) = phase.dt {
                self.change_step(dt)?;
            }
            let dt = self
                .network
                .clock(self.source_clock)
                .map(Clock::dt)
                .unwrap_or(self.config.dt);

            let spikes_before = self.spike_monitor.count();
            let pushed_before = self.push.pushed();
            let delivered_before = self.delivered();

            let summary = self.network.run(phase.duration)?;

            let pushed = self.push.pushed() - pushed_before;
            let delivered = self.delivered() - delivered_before;
            if let Some(metrics) = &self.metrics {
                metrics.spikes_pushed.inc_by(pushed);
                metrics.spikes_delivered.inc_by(delivered);
            }
            phases.push(PhaseReport {
                index,
                dt,
                start: summary.start,
                end: summary.end,
                ticks: summary.ticks,
                spikes: (self.spike_monitor.count() - spikes_before) as u64,
                pushed,
                delivered,
            });
        }

        let report = ScenarioReport {
            workers,
            synapses: self.connectivity.len(),
            dropped_synapses: self.dropped,
            total_spikes: self.spike_monitor.count() as u64,
            pushed: self.push.pushed(),
            delivered: self.delivered(),
            // The slot gathered last tick is delivered but not yet cleared.
            in_flight: (self.pathway.pending() - self.pathway.peek().len()) as u64,
            mean_rate_hz: self.rate_monitor.mean_rate(),
            phases,
            digest: self.digest(),
        };
        info!(
            spikes = report.total_spikes,
            delivered = report.delivered,
            digest = %report.digest,
            "scenario finished"
        );
        Ok(report)
    }

    fn change_step(&mut self, dt: f64) -> Result<(), ScenarioError> {
        let clock = self
            .network
            .clock_mut(self.source_clock)
            .ok_or_else(|| ScenarioError::Invalid("source clock missing".into()))?;
        if clock.dt() == dt {
            return Ok(());
        }
        debug!(from = clock.dt(), to = dt, "changing source step");
        clock.set_dt(dt)?;
        self.pathway
            .prepare(&self.connectivity.delays, &self.connectivity.sources, dt)?;
        Ok(())
    }

    fn delivered(&self) -> u64 {
        self.deliveries
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// BLAKE3 over spike records, delivery samples and final per-target counts.
    fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (index, t) in self.spike_monitor.records() {
            hasher.update(&(index as u64).to_le_bytes());
            hasher.update(&t.to_bits().to_le_bytes());
        }
        for (t, values) in self.samples.records() {
            hasher.update(&t.to_bits().to_le_bytes());
            for value in values {
                hasher.update(&value.to_bits().to_le_bytes());
            }
        }
        for count in self.deliveries.iter() {
            hasher.update(&count.load(Ordering::Relaxed).to_le_bytes());
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}
