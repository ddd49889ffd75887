#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Worker primitives shared by the store and dashboards.
//!
//! Everything that must run off the caller's thread goes through this crate:
//! FIFO [`WorkQueue`]s for notification fan-out and re-rendering, tagged
//! spawn helpers for section data fetching, and [`LivenessToken`]s so late
//! work can tell that its owner has gone away.

mod class;
mod panic;
mod queue;
mod registry;
mod spawn;
mod token;

pub use class::TaskClass;
pub use panic::{join_error_panic_message, panic_message};
pub use queue::{QueueError, WorkQueue};
pub use registry::{WorkerRecord, WorkerRegistry};
pub use spawn::{spawn, spawn_blocking, spawn_named_thread};
pub use token::{GenerationClock, LivenessToken};
