use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClockError {
    #[error("Invalid step size {dt} for clock '{name}' (must be positive and finite)")]
    InvalidStep { name: String, dt: f64 },
}

/// Delay queue error conditions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("Invalid step size {0} (must be positive and finite)")]
    InvalidStep(f64),

    #[error("Delay and source arrays differ in length ({delays} vs {sources})")]
    LengthMismatch { delays: usize, sources: usize },

    #[error("Invalid delay {delay} for item {item} (must be non-negative and finite)")]
    InvalidDelay { item: usize, delay: f64 },

    #[error("Source index {index} of item {item} outside [{start}, {stop})")]
    SourceOutOfRange {
        item: usize,
        index: usize,
        start: usize,
        stop: usize,
    },

    #[error("Delay queue cannot grow to {requested} slots")]
    CapacityExhausted { requested: usize },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathwayError {
    #[error("Delay queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Pathway needs at least one worker")]
    NoWorkers,

    #[error("Invalid source range [{start}, {stop})")]
    InvalidSourceRange { start: usize, stop: usize },

    #[error("Worker {worker} out of range for {workers} workers")]
    UnknownWorker { worker: usize, workers: usize },

    #[error("Pathway built for {pathway} workers but the run uses {runtime}")]
    WorkerCountMismatch { pathway: usize, runtime: usize },
}
