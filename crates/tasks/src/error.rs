// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for task dispatch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed payload for task type {task_type}: {source}")]
    MalformedPayload { task_type: &'static str, #[source] source: serde_json::Error },

    #[error("unsupported config_update kind: {0}")]
    UnsupportedConfigKind(String),

    #[error(transparent)]
    Egress(#[from] nspass_supervisor::SupervisorError),

    #[error(transparent)]
    Filter(#[from] nspass_netfilter::ReconcileError),

    #[error("agent restart failed: {0}")]
    AgentRestart(String),

    #[error("health check failed: {0}")]
    HealthCheckFailed(String),
}
