// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the session transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to dial control plane: {0}")]
    Dial(String),

    #[error("handshake rejected: HTTP {status}")]
    HandshakeRejected { status: u16 },

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
}
