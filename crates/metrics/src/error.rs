// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the metrics collector.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to read {path}: {source}")]
    ProcRead { path: &'static str, #[source] source: std::io::Error },
}
