use serde::{Deserialize, Serialize};

/// Counters for one phase of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub index: usize,
    /// Source clock step used during the phase.
    pub dt: f64,
    pub start: f64,
    pub end: f64,
    pub ticks: u64,
    pub spikes: u64,
    pub pushed: u64,
    pub delivered: u64,
}

/// Summary of a full scenario run.
///
/// `digest` covers the spike trains, the sampled delivery counts and the final
/// per-target counts; it is the same for every worker count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub workers: usize,
    pub synapses: usize,
    pub dropped_synapses: usize,
    pub total_spikes: u64,
    pub pushed: u64,
    pub delivered: u64,
    /// Items still queued when the last phase ended.
    pub in_flight: u64,
    pub mean_rate_hz: f64,
    pub phases: Vec<PhaseReport>,
    pub digest: String,
}
