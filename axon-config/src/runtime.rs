//! Runtime configuration parameters.
//!
//! Settings shared by the scheduler and every pathway of a run:
//! - Worker pool size
//! - Handling of items that do not split evenly across workers

use axon_core::pathway::RemainderPolicy;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Worker pool configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct RuntimeConfig {
    /// Number of workers. Fixed for the whole run and used by the scheduler
    /// and every pathway alike.
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 1024))]
    pub workers: usize,

    /// Policy for the trailing `items % workers` pathway items.
    #[serde(default)]
    pub remainder_policy: RemainderPolicy,
}

fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            remainder_policy: RemainderPolicy::default(),
        }
    }
}
