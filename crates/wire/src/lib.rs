// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol: the envelope/frame schema exchanged with the control plane.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod codec;
pub mod envelope;
pub mod payload;

pub use codec::{CodecError, decode, encode, error_reply};
pub use envelope::{Envelope, MessageType};
pub use payload::{
    ConnectionMetrics, EgressAckPayload, EgressConfigPayload, EgressItemResult, ErrorMetrics,
    ErrorPayload, FilterAckPayload, FilterConfigPayload, HeartbeatPayload, MetricsPayload,
    Payload, PerformanceMetrics, RemoteIpCount, SystemMetrics, TaskPayload, TaskResultPayload,
    TrafficMetrics,
};
