//! Scenario configuration for the bundled simulator.
//!
//! Describes a seeded Poisson source population projecting onto a target
//! population through one delayed pathway, and the sequence of runs
//! (phases) to execute.
use std::path::{Path, PathBuf};

use figment::providers::{Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{validation, ConfigError};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[validate(schema(function = validation::validate_delay_bounds))]
pub struct ScenarioConfig {
    /// Seed for connectivity, delays and spike generation.
    pub seed: u64,
    /// Size of the source population.
    #[validate(range(min = 1))]
    pub sources: usize,
    /// Size of the target population.
    #[validate(range(min = 1))]
    pub targets: usize,
    /// Probability that a given source connects to a given target.
    #[validate(range(min = 0.0, max = 1.0))]
    pub connection_probability: f64,
    /// Mean firing rate of each source neuron (Hz).
    #[validate(range(min = 0.0))]
    pub firing_rate_hz: f64,
    /// Shortest synaptic delay (seconds).
    #[validate(range(min = 0.0))]
    pub min_delay: f64,
    /// Longest synaptic delay (seconds).
    #[validate(range(min = 0.0))]
    pub max_delay: f64,
    /// Initial step size of the source clock (seconds).
    #[validate(range(exclusive_min = 0.0))]
    pub dt: f64,
    /// Step size of the rate monitor clock (seconds).
    #[validate(range(exclusive_min = 0.0))]
    pub monitor_dt: f64,
    /// Consecutive runs; each may change the source clock step first.
    #[validate(length(min = 1), nested)]
    pub phases: Vec<PhaseConfig>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct PhaseConfig {
    /// Simulated duration of this run (seconds).
    #[validate(range(min = 0.0))]
    pub duration: f64,
    /// New source clock step applied before the run, if any.
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub dt: Option<f64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sources: 100,
            targets: 100,
            connection_probability: 0.1,
            firing_rate_hz: 20.0,
            min_delay: 0.001,
            max_delay: 0.005,
            dt: 0.0001,
            monitor_dt: 0.001,
            phases: vec![
                PhaseConfig {
                    duration: 0.1,
                    dt: None,
                },
                PhaseConfig {
                    duration: 0.1,
                    dt: Some(0.00005),
                },
            ],
        }
    }
}

impl ScenarioConfig {
    /// Load only a scenario from a YAML file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Figment::new()
            .merge(Yaml::file(path))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Total simulated time over all phases.
    pub fn total_duration(&self) -> f64 {
        self.phases.iter().map(|p| p.duration).sum()
    }
}
