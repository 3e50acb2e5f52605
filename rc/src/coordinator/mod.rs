//! Coordinator for in-flight requests
//!
//! The Coordinator is a single-consumer actor. Three events drive it:
//! - **Submit:** Decode a payload, start a task unit, arm a deadline timer
//! - **Completed:** A task unit reports its outcome
//! - **TimedOut:** A deadline timer fires
//!
//! Every request ends in exactly one frame on the output sink.
//!
//! `Completed` and `TimedOut` are internal; drivers only get a
//! [`CoordinatorHandle`], so they cannot forge events into the table:
//!
//! ```compile_fail
//! use reqcoord::coordinator::CoordRequest;
//! ```
//!
//! ```compile_fail
//! # use reqcoord::{Coordinator, CoordinatorConfig, HandlerTable};
//! fn raw_sender(coord: &Coordinator<tokio::io::Sink>) {
//!     let _ = coord.sender();
//! }
//! ```

mod core;
mod handle;
mod messages;
mod runner;

pub use core::Coordinator;
pub use handle::CoordinatorHandle;
pub use messages::{CoordinatorMetrics, Outcome, TaskId};
