//! Wire protocol for replies
//!
//! ASCII headers, binary-safe bodies. Framing relies only on declared lengths:
//!
//! ```text
//! REPLY <id> <segment-count>\n  (<tag> <len>\n<bytes>)*
//! EXCEPTION <id> <len>\n<bytes>
//! ```

mod frame;
mod reply;
mod segment;

pub use frame::{Frame, FrameError, MAX_BODY_SIZE, read_frame};
pub use reply::{ReplyWriter, render_reply};
pub use segment::{Segment, encode_segment, encode_segment_into};
