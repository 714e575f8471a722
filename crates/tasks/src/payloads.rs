// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed shapes of the `serde_json::Value` carried in a `TaskPayload`'s
//! `payload` field, one per [`nspass_core::TaskType`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigUpdateKind {
    Proxy,
    Iptables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUpdatePayload {
    pub kind: ConfigUpdateKind,
    pub config: serde_json::Value,
    #[serde(default)]
    pub restart_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartTarget {
    Proxy,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartPayload {
    pub service: RestartTarget,
}

/// `SYNC_RULES`/`SYNC_USERS` are structured no-ops: the control plane tells
/// the agent how many items it expects to see applied via the dedicated
/// push messages, and the agent echoes that count back without performing
/// any work itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPayload {
    #[serde(default)]
    pub expected_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckPayload {
    pub probes: Vec<String>,
}
