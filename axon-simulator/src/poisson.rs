//! Independent Poisson spike sources.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use axon_core::sync::TickContext;
use axon_engine::{Binding, BindingError, SpikeSpace};

/// Every neuron spikes with probability `rate * dt` per tick.
///
/// Draws happen on the designated worker in index order, so the spike train
/// only depends on the seed and the sequence of `dt`s.
pub struct PoissonGroup {
    name: String,
    rate_hz: f64,
    spikes: Arc<SpikeSpace>,
    rng: Mutex<StdRng>,
}

impl PoissonGroup {
    pub fn new(name: impl Into<String>, size: usize, rate_hz: f64, seed: u64) -> Self {
        Self {
            name: name.into(),
            rate_hz,
            spikes: Arc::new(SpikeSpace::new(size)),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn spikes(&self) -> Arc<SpikeSpace> {
        Arc::clone(&self.spikes)
    }
}

impl Binding for PoissonGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError> {
        if !ctx.is_designated() {
            return Ok(());
        }
        let p = (self.rate_hz * ctx.dt).clamp(0.0, 1.0);
        let mut rng = self.rng.lock();
        let fired = (0..self.spikes.size())
            .filter(|_| rng.random_bool(p))
            .collect();
        self.spikes.publish(fired);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train(seed: u64) -> Vec<Vec<usize>> {
        let group = PoissonGroup::new("g", 50, 200.0, seed);
        (0..20)
            .map(|step| {
                group
                    .execute(&TickContext::solo(step as f64 * 0.01, 0.01, step))
                    .unwrap();
                group.spikes().read().clone()
            })
            .collect()
    }

    #[test]
    fn same_seed_same_spikes() {
        assert_eq!(train(3), train(3));
        assert_ne!(train(3), train(4));
    }

    #[test]
    fn silent_and_saturated_rates() {
        let silent = PoissonGroup::new("s", 10, 0.0, 1);
        silent.execute(&TickContext::solo(0.0, 0.1, 0)).unwrap();
        assert!(silent.spikes().read().is_empty());

        let saturated = PoissonGroup::new("f", 10, 1e6, 1);
        saturated.execute(&TickContext::solo(0.0, 0.1, 0)).unwrap();
        assert_eq!(*saturated.spikes().read(), (0..10).collect::<Vec<_>>());
    }
}
