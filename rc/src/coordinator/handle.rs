//! CoordinatorHandle - Client interface for the external driver

use eyre::{Result, eyre};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::{CoordRequest, CoordinatorMetrics};
use crate::kind::RequestKind;

/// Handle for submitting work to the Coordinator
///
/// This handle is cloneable. Submission is fire-and-forget: the reply shows
/// up later as a frame on the Coordinator's output sink.
#[derive(Clone)]
pub struct CoordinatorHandle {
    /// Sender to the Coordinator task
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        debug!("CoordinatorHandle::new: called");
        Self { tx }
    }

    /// Submit a request; `payload` must decode to `[id, params...]`
    pub async fn submit(&self, kind: RequestKind, payload: impl Into<Vec<u8>>) -> Result<()> {
        debug!(%kind, "CoordinatorHandle::submit: called");
        self.tx
            .send(CoordRequest::Submit {
                kind,
                payload: payload.into(),
            })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        debug!("CoordinatorHandle::submit: sent");
        Ok(())
    }

    /// Get current coordinator metrics
    pub async fn metrics(&self) -> Result<CoordinatorMetrics> {
        debug!("CoordinatorHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(CoordRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        debug!("CoordinatorHandle::metrics: waiting for reply");
        reply_rx.await.map_err(|_| eyre!("Coordinator shutdown before reply"))
    }

    /// Request shutdown; outstanding requests are abandoned without frames
    pub async fn shutdown(&self) -> Result<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::DocOrigin;

    #[tokio::test]
    async fn test_submit_enqueues_request() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = CoordinatorHandle::new(tx);

        handle
            .submit(RequestKind::DocExtraction { origin: DocOrigin::Edoc }, b"[1]".to_vec())
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            CoordRequest::Submit { kind, payload } => {
                assert_eq!(kind, RequestKind::DocExtraction { origin: DocOrigin::Edoc });
                assert_eq!(payload, b"[1]");
            }
            other => panic!("Wrong request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_channel_is_error() {
        let (tx, rx) = mpsc::channel(10);
        drop(rx);
        let handle = CoordinatorHandle::new(tx);

        let err = handle.submit(RequestKind::TestInfo, "[1]").await.unwrap_err();
        assert!(err.to_string().contains("channel closed"));
        assert!(handle.metrics().await.is_err());
        assert!(handle.shutdown().await.is_err());
    }
}
