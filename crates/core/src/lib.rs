// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared data model and primitives for the nspass node agent.
//!
//! This crate holds the types every other crate in the workspace agrees on:
//! task records, proxy instance state, declared packet-filter rules and
//! egress items, and the small set of macros/abstractions (id generation,
//! clock) used to keep those types testable.

// Allow panic!/unwrap/expect in test code.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod egress;
pub mod filter;
pub mod id;
pub mod macros;
pub mod monitor;
pub mod proxy;
pub mod task;

pub use clock::{Clock, FakeClock, SharedClock, SystemClock};
pub use egress::{DeclaredEgressItem, EgressOverrides, ProtocolConfig};
pub use filter::{CHAIN_PREFIX, DeclaredRule, FilterTable, RuleAction, RuleId, TAG_PREFIX};
pub use id::IdBuf;
pub use monitor::MonitorStats;
pub use proxy::{
    EgressId, InstanceStatus, MAX_RESTART_HISTORY, ProcessStatus, ProxyInstanceState,
    ProxyVariant, RestartHistory, RestartRecord,
};
pub use task::{TASK_RECORD_MAX_AGE_MILLIS, TaskId, TaskRecord, TaskStatus, TaskType};

crate::define_id! {
    /// Agent-generated id carried on every wire envelope.
    pub struct MessageId("msg-");
}
