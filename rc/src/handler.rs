//! Task handler trait definition
//!
//! Handlers perform the actual computation for a request (documentation
//! extraction, test discovery, lint analysis). The coordinator only sees them
//! through this trait.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::kind::RequestKind;
use crate::payload::RequestId;
use crate::protocol::Segment;

/// Result returned by a handler invocation
pub type HandlerResult = Result<Vec<Segment>, Diagnostic>;

/// A handler bound to one request kind
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Handler name, used in logs and crash diagnostics
    fn name(&self) -> &'static str;

    /// Run the handler for one request
    async fn run(&self, input: TaskInput) -> HandlerResult;
}

/// Everything a handler gets for one request
#[derive(Debug, Clone)]
pub struct TaskInput {
    pub request_id: RequestId,

    /// Kind of the request, carrying the kind-specific fixed arguments
    pub kind: RequestKind,

    /// Parameters following the request id in the submitted payload
    pub params: Vec<Value>,
}

/// Opaque diagnostic bytes written as the body of an `EXCEPTION` frame
#[derive(Clone, PartialEq, Eq)]
pub struct Diagnostic(Vec<u8>);

impl Diagnostic {
    /// Diagnostic synthesized by the coordinator when a deadline expires
    pub fn timeout() -> Self {
        debug!("Diagnostic::timeout: called");
        Self(b"Timeout".to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Diagnostic")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

impl From<Vec<u8>> for Diagnostic {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Diagnostic {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<String> for Diagnostic {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<&str> for Diagnostic {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<eyre::Report> for Diagnostic {
    fn from(report: eyre::Report) -> Self {
        Self(format!("{report:?}").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_diagnostic() {
        let diag = Diagnostic::timeout();
        assert_eq!(diag.as_bytes(), b"Timeout");
        assert_eq!(diag.len(), 7);
    }

    #[test]
    fn test_diagnostic_from_report_keeps_context() {
        let report = eyre::eyre!("parse failed").wrap_err("while reading module foo");
        let diag = Diagnostic::from(report);
        let text = String::from_utf8(diag.into_bytes()).unwrap();
        assert!(text.contains("while reading module foo"));
        assert!(text.contains("parse failed"));
    }

    #[test]
    fn test_diagnostic_debug_is_readable() {
        let diag = Diagnostic::from("bad arity");
        assert_eq!(format!("{diag:?}"), r#"Diagnostic("bad arity")"#);
    }
}
