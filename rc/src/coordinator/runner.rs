//! Task runner - one isolated tokio task per request

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::messages::{CoordRequest, Outcome, TaskId};
use crate::handler::{Diagnostic, TaskHandler, TaskInput};

/// Spawn a unit that runs `handler` and reports exactly one `Completed` event
///
/// Panics inside the handler are caught at the task boundary and reported as
/// a failure, so they never reach the Coordinator.
pub(crate) fn spawn_unit(
    task_id: TaskId,
    handler: Arc<dyn TaskHandler>,
    input: TaskInput,
    events: mpsc::Sender<CoordRequest>,
) -> JoinHandle<()> {
    install_panic_hook();
    tokio::spawn(async move {
        let request_id = input.request_id;
        let kind = input.kind;
        debug!(%request_id, %task_id, %kind, handler = handler.name(), "spawn_unit: running handler");

        let outcome = match AssertUnwindSafe(handler.run(input)).catch_unwind().await {
            Ok(Ok(segments)) => Outcome::Success(segments),
            Ok(Err(diagnostic)) => Outcome::Failure(diagnostic),
            Err(panic) => {
                let message = panic_message(&*panic);
                let trace = take_panic_trace();
                error!(%request_id, %task_id, handler = handler.name(), %message, "Handler panicked");
                Outcome::Failure(Diagnostic::from(format!(
                    "handler {} panicked while serving {} request {} ({}): {}{}",
                    handler.name(),
                    kind,
                    request_id,
                    task_id,
                    message,
                    trace
                )))
            }
        };

        if events
            .send(CoordRequest::Completed {
                request_id,
                task_id,
                outcome,
            })
            .await
            .is_err()
        {
            debug!(%request_id, %task_id, "spawn_unit: coordinator gone, outcome dropped");
        }
    })
}

thread_local! {
    /// Location and backtrace of the last panic on this worker thread
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record panic context for the runner, then defer to the previous hook
///
/// A unit's panic and its `catch_unwind` happen within the same poll, so the
/// thread-local written here is the one the runner reads back.
fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let mut trace = String::new();
            if let Some(location) = info.location() {
                trace.push_str(&format!("\n    at {location}"));
            }
            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                trace.push_str(&format!("\n{backtrace}"));
            }
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> String {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take()).unwrap_or_default()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerResult;
    use crate::kind::{LintFlags, RequestKind};
    use crate::payload::RequestId;
    use crate::protocol::Segment;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn run(&self, input: TaskInput) -> HandlerResult {
            Ok(vec![Segment::new("P", input.params[0].to_string())])
        }
    }

    struct Refuse;

    #[async_trait]
    impl TaskHandler for Refuse {
        fn name(&self) -> &'static str {
            "refuse"
        }

        async fn run(&self, _input: TaskInput) -> HandlerResult {
            Err(Diagnostic::from("module not found"))
        }
    }

    struct Crash;

    #[async_trait]
    impl TaskHandler for Crash {
        fn name(&self) -> &'static str {
            "crash"
        }

        async fn run(&self, input: TaskInput) -> HandlerResult {
            if !input.params.is_empty() {
                panic!("boom at {}", input.request_id);
            }
            Ok(vec![])
        }
    }

    fn input(id: u64) -> TaskInput {
        TaskInput {
            request_id: RequestId(id),
            kind: RequestKind::LintAnalysis(LintFlags::default()),
            params: vec![json!("mod")],
        }
    }

    async fn run_one(handler: Arc<dyn TaskHandler>, id: u64) -> CoordRequest {
        let (tx, mut rx) = mpsc::channel(4);
        let unit = spawn_unit(TaskId(1), handler, input(id), tx);
        unit.await.unwrap();

        let event = rx.recv().await.unwrap();
        // Exactly one event per unit
        assert!(rx.recv().await.is_none());
        event
    }

    #[tokio::test]
    async fn test_success_reports_segments() {
        match run_one(Arc::new(Echo), 5).await {
            CoordRequest::Completed {
                request_id,
                task_id,
                outcome,
            } => {
                assert_eq!(request_id, RequestId(5));
                assert_eq!(task_id, TaskId(1));
                assert_eq!(outcome, Outcome::Success(vec![Segment::new("P", r#""mod""#)]));
            }
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_reports_failure() {
        match run_one(Arc::new(Refuse), 6).await {
            CoordRequest::Completed { outcome, .. } => {
                assert_eq!(outcome, Outcome::Failure(Diagnostic::from("module not found")));
            }
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panic_reports_failure_with_message() {
        match run_one(Arc::new(Crash), 9).await {
            CoordRequest::Completed { outcome, .. } => {
                let Outcome::Failure(diag) = outcome else {
                    panic!("Expected failure");
                };
                let text = String::from_utf8(diag.into_bytes()).unwrap();
                assert!(text.contains("boom at 9"));
                // Location of the panic! in Crash::run
                assert!(text.contains("runner.rs:"));
                assert!(text.contains("crash"));
                assert!(text.contains("lint_analysis"));
            }
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[test]
    fn test_panic_message_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42u32);

        assert_eq!(panic_message(&*static_str), "static");
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }
}
