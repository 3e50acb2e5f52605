//! Main Coordinator task implementation

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, CoordinatorMetrics, Outcome, TaskId};
use super::runner::spawn_unit;
use crate::config::CoordinatorConfig;
use crate::handler::{Diagnostic, TaskInput};
use crate::kind::{HandlerTable, RequestKind, TimeoutPolicy};
use crate::payload::{PayloadError, RequestId, decode_payload, peek_request_id};
use crate::protocol::ReplyWriter;

/// In-flight request tracking
struct InFlight {
    task_id: TaskId,
    kind: RequestKind,
    task: JoinHandle<()>,
    timer: Option<JoinHandle<()>>,
    started: Instant,
}

/// Remove the entry for `request_id` only if it still belongs to `task_id`
fn take_entry(table: &mut HashMap<RequestId, InFlight>, request_id: RequestId, task_id: TaskId) -> Option<InFlight> {
    if table.get(&request_id)?.task_id != task_id {
        return None;
    }
    table.remove(&request_id)
}

/// The Coordinator owns all in-flight requests and the output sink
pub struct Coordinator<W> {
    config: CoordinatorConfig,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
    handlers: HandlerTable,
    policy: TimeoutPolicy,
    writer: ReplyWriter<W>,
}

impl<W> Coordinator<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a new Coordinator writing frames to `sink`
    pub fn new(config: CoordinatorConfig, handlers: HandlerTable, sink: W) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self {
            policy: TimeoutPolicy::from_config(&config),
            config,
            tx,
            rx,
            handlers,
            writer: ReplyWriter::new(sink),
        }
    }

    /// Raw mailbox sender, for injecting internal events in tests
    #[cfg(test)]
    pub(crate) fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    /// Create a handle for the external driver
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested or
    /// every sender (handles and running units) is gone.
    pub async fn run(self) {
        let Self {
            config,
            tx,
            mut rx,
            handlers,
            policy,
            mut writer,
        } = self;

        // Only handles and live units keep the mailbox open
        let coord_tx = tx.downgrade();
        drop(tx);

        // Internal state
        let mut in_flight: HashMap<RequestId, InFlight> = HashMap::new();
        let mut next_task_id: u64 = 0;

        // Metrics
        let mut metrics = CoordinatorMetrics::default();

        info!("Coordinator started");

        while let Some(req) = rx.recv().await {
            match req {
                CoordRequest::Submit { kind, payload } => {
                    metrics.submitted += 1;

                    if payload.len() > config.max_payload_size {
                        let rejected = PayloadError::TooLarge {
                            size: payload.len(),
                            limit: config.max_payload_size,
                        };
                        match peek_request_id(&payload) {
                            Ok(request_id) => {
                                warn!(%request_id, %kind, error = %rejected, "Rejecting oversized request");
                                let outcome = Outcome::Failure(Diagnostic::from(rejected.to_string()));
                                emit(&mut writer, &mut metrics, request_id, outcome).await;
                            }
                            Err(e) => {
                                warn!(%kind, error = %e, "Dropping oversized request without id");
                                metrics.decode_failures += 1;
                            }
                        }
                        continue;
                    }

                    let (request_id, params) = match decode_payload(&payload) {
                        Ok(decoded) => decoded,
                        Err(e) => {
                            // No id to correlate, so no frame can be written
                            warn!(%kind, error = %e, "Dropping undecodable request");
                            metrics.decode_failures += 1;
                            continue;
                        }
                    };

                    let Some(events) = coord_tx.upgrade() else {
                        warn!(%request_id, "Coordinator closing, request abandoned");
                        continue;
                    };

                    let task_id = TaskId(next_task_id);
                    next_task_id += 1;

                    let handler = handlers.handler_for(&kind);
                    let deadline = policy.deadline(&kind);
                    debug!(
                        %request_id,
                        %task_id,
                        %kind,
                        handler = handler.name(),
                        ?deadline,
                        "Dispatching request"
                    );

                    let input = TaskInput {
                        request_id,
                        kind,
                        params,
                    };
                    let timer = deadline.map(|deadline| spawn_timer(deadline, request_id, task_id, events.clone()));
                    let task = spawn_unit(task_id, handler, input, events);

                    let entry = InFlight {
                        task_id,
                        kind,
                        task,
                        timer,
                        started: Instant::now(),
                    };
                    if let Some(previous) = in_flight.insert(request_id, entry) {
                        // Identity reuse is the driver's bug; the earlier request will never reply
                        warn!(%request_id, previous_task = %previous.task_id, "Request id reused while outstanding");
                    }
                }

                CoordRequest::Completed {
                    request_id,
                    task_id,
                    outcome,
                } => {
                    let Some(entry) = take_entry(&mut in_flight, request_id, task_id) else {
                        debug!(%request_id, %task_id, "Completion for unknown request dropped");
                        metrics.dropped_completions += 1;
                        continue;
                    };

                    // Best effort, a timer that already fired is caught by take_entry
                    if let Some(timer) = entry.timer {
                        timer.abort();
                    }

                    debug!(
                        %request_id,
                        kind = %entry.kind,
                        success = outcome.is_success(),
                        elapsed_ms = entry.started.elapsed().as_millis() as u64,
                        "Request completed"
                    );
                    emit(&mut writer, &mut metrics, request_id, outcome).await;
                }

                CoordRequest::TimedOut { request_id, task_id } => {
                    let Some(entry) = take_entry(&mut in_flight, request_id, task_id) else {
                        debug!(%request_id, %task_id, "Timeout for unknown request dropped");
                        metrics.dropped_timeouts += 1;
                        continue;
                    };

                    entry.task.abort();
                    metrics.timeouts += 1;
                    warn!(
                        %request_id,
                        kind = %entry.kind,
                        elapsed_ms = entry.started.elapsed().as_millis() as u64,
                        "Request timed out"
                    );
                    emit(&mut writer, &mut metrics, request_id, Outcome::Failure(Diagnostic::timeout())).await;
                }

                CoordRequest::GetMetrics { reply_tx } => {
                    metrics.in_flight = in_flight.len();
                    let _ = reply_tx.send(metrics.clone());
                }

                CoordRequest::Shutdown => {
                    info!(outstanding = in_flight.len(), "Coordinator shutting down");
                    break;
                }
            }
        }

        // Outstanding requests are abandoned, no frames are written for them
        for (_, entry) in in_flight.drain() {
            entry.task.abort();
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }

        info!("Coordinator stopped");
    }
}

/// Arm a deadline for one task unit
fn spawn_timer(
    deadline: Duration,
    request_id: RequestId,
    task_id: TaskId,
    events: mpsc::Sender<CoordRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        let _ = events.send(CoordRequest::TimedOut { request_id, task_id }).await;
    })
}

async fn emit<W>(
    writer: &mut ReplyWriter<W>,
    metrics: &mut CoordinatorMetrics,
    request_id: RequestId,
    outcome: Outcome,
) where
    W: AsyncWrite + Unpin,
{
    match writer.write(request_id, &outcome).await {
        Ok(_) if outcome.is_success() => metrics.replies += 1,
        Ok(_) => metrics.exceptions += 1,
        Err(e) => {
            error!(%request_id, error = %e, "Failed to write frame");
            metrics.write_failures += 1;
        }
    }
}
