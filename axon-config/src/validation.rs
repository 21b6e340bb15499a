//! Custom validation functions for configuration.

use validator::ValidationError;

use crate::scenario::ScenarioConfig;

/// Validate a `tracing` level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"].contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that the synaptic delay window is ordered.
pub fn validate_delay_bounds(scenario: &ScenarioConfig) -> Result<(), ValidationError> {
    if scenario.min_delay <= scenario.max_delay {
        Ok(())
    } else {
        Err(ValidationError::new("min_delay_exceeds_max_delay"))
    }
}
