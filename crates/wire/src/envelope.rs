// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire-level envelope every frame carries.

use nspass_core::MessageId;
use serde::{Deserialize, Serialize};

use crate::payload::Payload;

/// The seven message types the wire protocol recognises. No other variant is
/// permitted — unknown discriminants fail to deserialise and the frame is
/// dropped rather than torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Task,
    Heartbeat,
    Ack,
    Error,
    Metrics,
    EgressConfig,
    FilterConfig,
}

nspass_core::simple_display! {
    MessageType {
        Task => "TASK",
        Heartbeat => "HEARTBEAT",
        Ack => "ACK",
        Error => "ERROR",
        Metrics => "METRICS",
        EgressConfig => "EGRESS_CONFIG",
        FilterConfig => "FILTER_CONFIG",
    }
}

/// Every frame exchanged with the control plane is one `Envelope`,
/// serialised into the body of a single binary WebSocket message.
///
/// Universal invariant: `correlation_id` is `None` unless `kind` is `Ack`
/// or `Error`, in which case it names the id of the message being answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: MessageId,
    pub kind: MessageType,
    pub timestamp_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<MessageId>,
    pub payload: Payload,
}

impl Envelope {
    /// Construct a fresh outbound envelope with a new id and the given
    /// timestamp. `correlation_id` is left unset — callers answering a
    /// specific inbound message should use [`Envelope::reply_to`] instead.
    pub fn new(kind: MessageType, timestamp_millis: i64, payload: Payload) -> Self {
        Self { id: MessageId::new(), kind, timestamp_millis, correlation_id: None, payload }
    }

    /// Construct a reply envelope (`ACK`/`ERROR`) whose `correlation_id`
    /// names the envelope it answers.
    pub fn reply_to(source_id: MessageId, kind: MessageType, timestamp_millis: i64, payload: Payload) -> Self {
        Self { id: MessageId::new(), kind, timestamp_millis, correlation_id: Some(source_id), payload }
    }

    /// Whether this envelope satisfies the universal correlation-id
    /// invariant above.
    pub fn correlation_id_is_valid(&self) -> bool {
        match self.kind {
            MessageType::Ack | MessageType::Error => self.correlation_id.is_some(),
            _ => self.correlation_id.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::HeartbeatPayload;

    #[test]
    fn non_reply_envelopes_carry_no_correlation_id() {
        let env = Envelope::new(
            MessageType::Heartbeat,
            1,
            Payload::Heartbeat(HeartbeatPayload {
                agent_id: "a1".into(),
                timestamp_millis: 1,
                status: "online".into(),
                labels: Default::default(),
            }),
        );
        assert!(env.correlation_id_is_valid());
    }

    #[test]
    fn ack_without_correlation_id_is_invalid() {
        let env = Envelope::new(
            MessageType::Ack,
            1,
            Payload::Heartbeat(HeartbeatPayload {
                agent_id: "a1".into(),
                timestamp_millis: 1,
                status: "online".into(),
                labels: Default::default(),
            }),
        );
        assert!(!env.correlation_id_is_valid());
    }

    #[test]
    fn reply_to_sets_correlation_id() {
        let source = MessageId::new();
        let env = Envelope::reply_to(
            source,
            MessageType::Ack,
            2,
            Payload::Heartbeat(HeartbeatPayload {
                agent_id: "a1".into(),
                timestamp_millis: 1,
                status: "online".into(),
                labels: Default::default(),
            }),
        );
        assert_eq!(env.correlation_id, Some(source));
        assert!(env.correlation_id_is_valid());
    }
}
