// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the packet-filter reconciler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to dump kernel filter state: {0}")]
    Dump(#[source] std::io::Error),

    #[error("failed to parse save-format dump: {0}")]
    Parse(String),

    #[error("failed to write backup file: {0}")]
    Backup(#[source] std::io::Error),

    #[error("failed to write temporary restore file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("restore utility exited non-zero ({exit_code:?}); rolled back to previous state: {stderr}")]
    RestoreFailed { exit_code: Option<i32>, stderr: String },

    #[error("rollback to backup also failed: {0}")]
    RollbackFailed(String),

    #[error("failed to persist canonical rules file: {0}")]
    Persist(#[source] std::io::Error),
}
