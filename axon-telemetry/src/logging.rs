//! ## axon-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! `RUST_LOG` takes precedence over the configured level. Worker threads are
//! named `axon-worker-{i}`, so thread names are included in every line.

use tracing::{info_span, Span};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::TelemetryError;

#[derive(Clone)]
pub struct RunLogger;

impl RunLogger {
    /// Installs the global subscriber. Calling it again is a no-op.
    pub fn init(level: &str) -> Result<(), TelemetryError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(level)
                .map_err(|_| TelemetryError::Filter(level.to_string()))?,
        };
        // A subscriber may already be installed (tests, embedding callers).
        let _ = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
        Ok(())
    }

    /// Span wrapping one scenario phase.
    pub fn phase_span(phase: usize, duration: f64, workers: usize) -> Span {
        info_span!("phase", phase, duration, workers)
    }
}
