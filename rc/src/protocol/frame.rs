//! Frame reader for the driver side of the protocol

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::debug;

use super::segment::Segment;
use crate::handler::Diagnostic;
use crate::payload::RequestId;

/// Largest body a single segment or exception may declare (256MB)
pub const MAX_BODY_SIZE: usize = 256 * 1024 * 1024;

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Reply { id: RequestId, segments: Vec<Segment> },
    Exception { id: RequestId, diagnostic: Diagnostic },
}

impl Frame {
    pub fn id(&self) -> RequestId {
        match self {
            Self::Reply { id, .. } | Self::Exception { id, .. } => *id,
        }
    }
}

/// Errors from frame decoding
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream ended inside a frame")]
    UnexpectedEof,

    #[error("Malformed header: {0:?}")]
    BadHeader(String),

    #[error("Unknown frame type: {0}")]
    UnknownFrame(String),

    #[error("Declared body of {size} bytes exceeds limit")]
    TooLarge { size: usize },
}

/// Read one frame, returning `None` on a clean end of stream
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(header) = read_header(reader).await? else {
        return Ok(None);
    };

    let mut fields = header.split(' ');
    let (Some(kind), Some(id), Some(count), None) = (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(FrameError::BadHeader(header));
    };
    let id = RequestId(parse_number(id, &header)?);
    let count = parse_number(count, &header)? as usize;

    let frame = match kind {
        "REPLY" => {
            let mut segments = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                let seg_header = read_header(reader).await?.ok_or(FrameError::UnexpectedEof)?;
                let (tag, len) = seg_header
                    .split_once(' ')
                    .ok_or_else(|| FrameError::BadHeader(seg_header.clone()))?;
                let len = parse_number(len, &seg_header)? as usize;
                let data = read_body(reader, len).await?;
                segments.push(Segment::new(tag, data));
            }
            Frame::Reply { id, segments }
        }
        "EXCEPTION" => {
            let data = read_body(reader, count).await?;
            Frame::Exception {
                id,
                diagnostic: Diagnostic::from(data),
            }
        }
        other => return Err(FrameError::UnknownFrame(other.to_string())),
    };

    debug!(id = %frame.id(), "read_frame: decoded frame");
    Ok(Some(frame))
}

async fn read_header<R>(reader: &mut R) -> Result<Option<String>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.pop() != Some(b'\n') {
        return Err(FrameError::UnexpectedEof);
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|e| FrameError::BadHeader(String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

async fn read_body<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    if len > MAX_BODY_SIZE {
        return Err(FrameError::TooLarge { size: len });
    }
    let mut data = vec![0; len];
    match reader.read_exact(&mut data).await {
        Ok(_) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(FrameError::UnexpectedEof),
        Err(e) => Err(e.into()),
    }
}

fn parse_number(field: &str, header: &str) -> Result<u64, FrameError> {
    field.parse().map_err(|_| FrameError::BadHeader(header.to_string()))
}
