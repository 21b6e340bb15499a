//! # axon-engine
//!
//! Multi-clock scheduler for simulations whose parts advance at different
//! rates, plus the bindings that move spikes through delayed pathways and
//! record what happens.
//!
//! ```no_run
//! use std::sync::Arc;
//! use axon_core::time::Clock;
//! use axon_engine::{FnBinding, Network};
//!
//! let mut network = Network::new(2);
//! let clock = network.add_clock(Clock::new("main", 0.001).unwrap());
//! network
//!     .add(clock, Arc::new(FnBinding::new("tick", |_ctx| Ok(()))))
//!     .unwrap();
//! network.run(1.0).unwrap();
//! ```

pub mod engine;

pub use engine::*;
