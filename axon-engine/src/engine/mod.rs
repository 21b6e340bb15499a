mod binding;
mod bindings;
mod error;
mod monitor;
mod network;

pub use self::{
    binding::{Binding, FnBinding},
    bindings::{DeliverSpikes, PushSpikes, SpikeSpace},
    error::{BindingError, SimulationError},
    monitor::{RateMonitor, SpikeMonitor, StateMonitor},
    network::{ClockId, Network, RunSummary},
};

pub mod prelude {
    pub use super::{
        Binding, BindingError, ClockId, DeliverSpikes, FnBinding, Network, PushSpikes,
        RateMonitor, RunSummary, SimulationError, SpikeMonitor, SpikeSpace, StateMonitor,
    };
}
