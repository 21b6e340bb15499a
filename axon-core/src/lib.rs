//! # axon-core
//!
//! Time and event plumbing for the axon multi-clock runtime.
//!
//! ### Key Submodules:
//! - `time`: per-rate-group `Clock` with epsilon-tolerant simultaneity
//! - `queue`: circular `DelayQueue` deferring items by an integer number of steps
//! - `pathway`: one delay queue per worker with a merged "due now" view
//! - `sync`: explicit worker rendezvous and the per-tick execution context
//!
//! Nothing here owns numeric state arrays; bindings built on top of these
//! types read and write their own buffers.

pub mod error;
pub mod pathway;
pub mod queue;
pub mod sync;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::pathway::{Pathway, PreparedPartition, RemainderPolicy};
    pub use crate::queue::DelayQueue;
    pub use crate::sync::{rendezvous_for, NoopRendezvous, Rendezvous, ThreadBarrier, TickContext};
    pub use crate::time::{same_time, Clock, EPSILON};
}

pub use error::{ClockError, PathwayError, QueueError};
