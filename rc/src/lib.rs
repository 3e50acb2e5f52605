//! ReqCoord - request coordinator for a tooling backend
//!
//! ReqCoord receives units of work from an external driver, runs each one as an
//! isolated tokio task, and streams the results back as length-prefixed frames
//! on a shared output sink.
//!
//! # Core Concepts
//!
//! - **Single-Consumer Actor**: One task owns the in-flight table; every event goes through its mailbox
//! - **Isolated Units**: Each request runs in its own task; panics become `EXCEPTION` frames
//! - **Per-Kind Deadlines**: The kind table decides which requests can time out
//! - **Exactly One Frame**: Completion/timeout races are resolved by table lookup-and-remove
//!
//! # Modules
//!
//! - [`coordinator`] - Coordinator actor, handle, task runner
//! - [`kind`] - Request kinds, handler bindings and timeout policy
//! - [`handler`] - Task handler trait and its inputs/outputs
//! - [`payload`] - Decoding of submitted request payloads
//! - [`protocol`] - Segment encoder, reply writer and frame reader
//! - [`config`] - Configuration types and loading
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod coordinator;
pub mod handler;
pub mod kind;
pub mod logging;
pub mod payload;
pub mod protocol;

// Re-export commonly used types
pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, CoordinatorHandle, CoordinatorMetrics, Outcome, TaskId};
pub use handler::{Diagnostic, HandlerResult, TaskHandler, TaskInput};
pub use kind::{DocOrigin, HandlerTable, LintFlags, RequestKind, TimeoutPolicy};
pub use payload::{PayloadError, RequestId, decode_payload, peek_request_id};
pub use protocol::{Frame, FrameError, ReplyWriter, Segment, encode_segment, read_frame, render_reply};
