//! Segment encoder

use std::fmt;
use std::io::Write;

/// One tagged chunk of a `REPLY` body
///
/// Tags are short ASCII words and must not contain spaces or newlines.
#[derive(Clone, PartialEq, Eq)]
pub struct Segment {
    pub tag: String,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn new(tag: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            tag: tag.into(),
            data: data.into(),
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("tag", &self.tag)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Encode a segment as `<tag> <len>\n<data>`
pub fn encode_segment(segment: &Segment) -> Vec<u8> {
    let mut out = Vec::with_capacity(segment.tag.len() + segment.data.len() + 12);
    encode_segment_into(segment, &mut out);
    out
}

/// Append the encoding of a segment to `out`
pub fn encode_segment_into(segment: &Segment, out: &mut Vec<u8>) {
    debug_assert!(!segment.tag.contains([' ', '\n']), "segment tag contains a separator");
    // Writing into a Vec cannot fail
    let _ = writeln!(out, "{} {}", segment.tag, segment.data.len());
    out.extend_from_slice(&segment.data);
}
