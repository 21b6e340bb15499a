/*!
# Axon Simulator

A seeded, self-contained workload for the axon scheduler: a population of
Poisson sources projects onto a target population through one delayed
pathway, while monitors record spikes, rates and deliveries. The resulting
[`ScenarioReport`] carries a BLAKE3 digest that must not depend on the worker
count.

## Key Components:
- **PoissonGroup:** Seeded spike generation on the designated worker.
- **Connectivity:** Random synapses with uniform delays.
- **Scenario:** Wires clocks, pathway and monitors, then runs each phase.
*/

mod error;
pub mod poisson;
pub mod report;
pub mod scenario;

pub use error::ScenarioError;
pub use poisson::PoissonGroup;
pub use report::{PhaseReport, ScenarioReport};
pub use scenario::{Connectivity, Scenario};
