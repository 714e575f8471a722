// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for proxy instance lifecycle and supervisor convergence.

use nspass_core::EgressId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("binary for protocol variant is not installed")]
    NotInstalled,

    #[error("instance is already running")]
    AlreadyRunning,

    #[error("failed to write config file: {0}")]
    ConfigWrite(#[source] std::io::Error),

    #[error("failed to parse declared config blob: {0}")]
    ConfigParse(String),

    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to signal process: {0}")]
    Signal(String),

    #[error("pid file I/O error: {0}")]
    PidFile(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("reconciliation failed for {} of {} declared items", .failures.len(), .total)]
    PartialFailure { total: usize, failures: Vec<(EgressId, InstanceError)> },
}
