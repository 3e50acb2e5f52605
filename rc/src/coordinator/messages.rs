//! Message types for the Coordinator

use std::fmt;

use tokio::sync::oneshot;

use crate::handler::Diagnostic;
use crate::kind::RequestKind;
use crate::payload::RequestId;
use crate::protocol::Segment;

/// Identity of one dispatched task unit, allocated by the Coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Unified result of a finished request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Segments to be written as a `REPLY`
    Success(Vec<Segment>),
    /// Diagnostic to be written as an `EXCEPTION`
    Failure(Diagnostic),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Requests to the Coordinator task
#[derive(Debug)]
pub(crate) enum CoordRequest {
    /// Start a new request
    Submit { kind: RequestKind, payload: Vec<u8> },

    /// A task unit finished (internal, sent by the task runner)
    Completed {
        request_id: RequestId,
        task_id: TaskId,
        outcome: Outcome,
    },

    /// A deadline expired (internal, sent by the timer)
    TimedOut { request_id: RequestId, task_id: TaskId },

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Shutdown the coordinator, abandoning outstanding requests
    Shutdown,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorMetrics {
    pub in_flight: usize,
    pub submitted: u64,
    pub replies: u64,
    pub exceptions: u64,
    pub timeouts: u64,
    /// Completions that arrived after their entry was gone
    pub dropped_completions: u64,
    /// Timer firings that arrived after their entry was gone
    pub dropped_timeouts: u64,
    pub decode_failures: u64,
    pub write_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_is_success() {
        assert!(Outcome::Success(vec![]).is_success());
        assert!(!Outcome::Failure(Diagnostic::timeout()).is_success());
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(17).to_string(), "task-17");
    }
}
