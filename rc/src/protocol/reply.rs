//! Reply writer

use std::io::Write;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::segment::encode_segment_into;
use crate::coordinator::Outcome;
use crate::payload::RequestId;

/// Render a finished request as one complete frame
pub fn render_reply(id: RequestId, outcome: &Outcome) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail
    match outcome {
        Outcome::Success(segments) => {
            let _ = writeln!(out, "REPLY {} {}", id, segments.len());
            for segment in segments {
                encode_segment_into(segment, &mut out);
            }
        }
        Outcome::Failure(diagnostic) => {
            let _ = writeln!(out, "EXCEPTION {} {}", id, diagnostic.len());
            out.extend_from_slice(diagnostic.as_bytes());
        }
    }
    out
}

/// Writes frames to the output sink
///
/// Each frame is rendered up front and handed to the sink in one `write_all`,
/// so frames never interleave as long as there is a single writer.
pub struct ReplyWriter<W> {
    sink: W,
}

impl<W: AsyncWrite + Unpin> ReplyWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Write one frame and flush, returning the number of bytes written
    pub async fn write(&mut self, id: RequestId, outcome: &Outcome) -> std::io::Result<usize> {
        let frame = render_reply(id, outcome);
        debug!(%id, len = frame.len(), "ReplyWriter::write: called");
        self.sink.write_all(&frame).await?;
        self.sink.flush().await?;
        Ok(frame.len())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
