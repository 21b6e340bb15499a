use thiserror::Error;

use axon_core::{ClockError, PathwayError, QueueError};

/// Failure reported by a binding body.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Pathway error: {0}")]
    Pathway(#[from] PathwayError),

    #[error("Delay queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Binding panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("No bindings registered")]
    NoBindings,

    #[error("Unknown clock id {0}")]
    UnknownClock(usize),

    #[error("Invalid run duration {0} (must be non-negative and finite)")]
    InvalidDuration(f64),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Binding '{binding}' failed at t={t}: {source}")]
    Binding {
        binding: String,
        t: f64,
        #[source]
        source: BindingError,
    },

    #[error("Worker thread failed: {0}")]
    WorkerPanicked(String),
}
