//! # Axon Telemetry
//!
//! Logging setup and Prometheus run metrics.

pub mod logging;
pub mod metrics;

use thiserror::Error;

pub use logging::RunLogger;
pub use metrics::RunMetrics;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{0}'")]
    Filter(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
