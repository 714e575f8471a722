// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encode/decode an [`Envelope`] to/from the bytes carried by a binary frame.
//!
//! The wire schema is treated as an opaque, swappable choice; this
//! workspace uses `serde_json` behind this module's `encode`/`decode`
//! boundary so the format can change without touching any other crate.

use nspass_core::MessageId;
use thiserror::Error;

use crate::envelope::{Envelope, MessageType};
use crate::payload::{ErrorPayload, Payload};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode envelope: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Serialise an envelope to the bytes placed in a binary WebSocket frame.
pub fn encode(envelope: &Envelope) -> Vec<u8> {
    // `Envelope`'s fields are all serde-derived and never fail to encode.
    serde_json::to_vec(envelope).unwrap_or_default()
}

/// Parse the bytes of an inbound binary frame into an envelope.
///
/// Deserialisation failures are returned as [`CodecError`] rather than
/// panicking — the caller logs and drops the frame, leaving the
/// connection open.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Build an `ERROR` envelope answering `source_id`.
pub fn error_reply(source_id: MessageId, timestamp_millis: i64, message: impl Into<String>) -> Envelope {
    Envelope::reply_to(
        source_id,
        MessageType::Error,
        timestamp_millis,
        Payload::Error(ErrorPayload { message: message.into() }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::HeartbeatPayload;

    #[test]
    fn round_trips_through_bytes() {
        let original = Envelope::new(
            MessageType::Heartbeat,
            42,
            Payload::Heartbeat(HeartbeatPayload {
                agent_id: "a1".into(),
                timestamp_millis: 42,
                status: "online".into(),
                labels: Default::default(),
            }),
        );
        let bytes = encode(&original);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.kind, original.kind);
        assert_eq!(decoded.timestamp_millis, original.timestamp_millis);
    }

    #[test]
    fn garbage_bytes_are_rejected_not_panicked() {
        let result = decode(b"not json");
        assert!(result.is_err());
    }
}
