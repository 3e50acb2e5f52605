//! Decoding of submitted request payloads
//!
//! A payload is a JSON array: the request id comes first, the kind-specific
//! parameters follow.

use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Correlation key supplied by the driver, unique per outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Errors from payload decoding
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Payload is not an array")]
    NotAnArray,

    #[error("Payload is empty, expected a request id")]
    MissingId,

    #[error("Invalid request id: {0}")]
    InvalidId(Value),

    #[error("Payload too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
}

/// Split a raw payload into its request id and the remaining parameters
pub fn decode_payload(raw: &[u8]) -> Result<(RequestId, Vec<Value>), PayloadError> {
    debug!(len = raw.len(), "decode_payload: called");
    let value: Value = serde_json::from_slice(raw)?;
    let Value::Array(mut items) = value else {
        return Err(PayloadError::NotAnArray);
    };

    if items.is_empty() {
        return Err(PayloadError::MissingId);
    }

    let params = items.split_off(1);
    let first = items.remove(0);
    let id = first.as_u64().ok_or(PayloadError::InvalidId(first))?;

    Ok((RequestId(id), params))
}

/// Read only the request id of a payload, skipping the parameters
///
/// Used for payloads that are rejected before dispatch but still need a frame.
pub fn peek_request_id(raw: &[u8]) -> Result<RequestId, PayloadError> {
    debug!(len = raw.len(), "peek_request_id: called");
    let LeadingId(first) = serde_json::from_slice(raw)?;
    let first = first.ok_or(PayloadError::MissingId)?;
    first.as_u64().map(RequestId).ok_or(PayloadError::InvalidId(first))
}

struct LeadingId(Option<Value>);

impl<'de> Deserialize<'de> for LeadingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LeadingIdVisitor;

        impl<'de> Visitor<'de> for LeadingIdVisitor {
            type Value = LeadingId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array starting with a request id")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<LeadingId, A::Error> {
                let first = seq.next_element::<Value>()?;
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(LeadingId(first))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, _map: A) -> Result<LeadingId, A::Error> {
                Err(de::Error::invalid_type(de::Unexpected::Map, &self))
            }
        }

        deserializer.deserialize_seq(LeadingIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_id_and_params() {
        let (id, params) = decode_payload(br#"[7, "lists", {"path": "src/lists.erl"}]"#).unwrap();
        assert_eq!(id, RequestId(7));
        assert_eq!(params, vec![json!("lists"), json!({"path": "src/lists.erl"})]);
    }

    #[test]
    fn test_decode_id_only() {
        let (id, params) = decode_payload(b"[42]").unwrap();
        assert_eq!(id, RequestId(42));
        assert!(params.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_array() {
        let err = decode_payload(br#"{"id": 1}"#).unwrap_err();
        assert!(matches!(err, PayloadError::NotAnArray));
    }

    #[test]
    fn test_decode_rejects_empty_array() {
        let err = decode_payload(b"[]").unwrap_err();
        assert!(matches!(err, PayloadError::MissingId));
    }

    #[test]
    fn test_decode_rejects_negative_id() {
        let err = decode_payload(br#"[-3, "x"]"#).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidId(_)));
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn test_peek_request_id_skips_params() {
        let raw = format!(r#"[12, "{}", {{"nested": [1, 2, 3]}}]"#, "x".repeat(4096));
        assert_eq!(peek_request_id(raw.as_bytes()).unwrap(), RequestId(12));
    }

    #[test]
    fn test_peek_request_id_errors() {
        assert!(matches!(peek_request_id(b"[]"), Err(PayloadError::MissingId)));
        assert!(matches!(peek_request_id(br#"["x"]"#), Err(PayloadError::InvalidId(_))));
        assert!(matches!(peek_request_id(br#"{"id": 1}"#), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_payload(b"\x83h\x02a\x07").unwrap_err();
        assert!(matches!(err, PayloadError::Malformed(_)));
    }
}
