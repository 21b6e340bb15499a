use thiserror::Error;

use axon_core::{ClockError, PathwayError};
use axon_engine::SimulationError;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Pathway error: {0}")]
    Pathway(#[from] PathwayError),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Invalid scenario: {0}")]
    Invalid(String),
}
