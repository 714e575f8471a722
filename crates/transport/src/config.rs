// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables for the session transport.

use std::time::Duration;

/// Everything the transport needs to dial and authenticate against the
/// control plane, plus the fixed interval each background loop runs on.
/// Production values use those intervals exactly; tests shrink them to
/// keep cases fast.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// e.g. `https://control.example.com` or `http://localhost:8080`. The
    /// scheme decides `wss` vs `ws`.
    pub base_url: String,
    pub agent_id: String,
    pub token: String,
    pub reconnect_backoff: Duration,
    pub read_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub metrics_interval: Duration,
    pub inbound_queue_capacity: usize,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>, agent_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent_id: agent_id.into(),
            token: token.into(),
            reconnect_backoff: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            metrics_interval: Duration::from_secs(60),
            inbound_queue_capacity: 100,
        }
    }

    /// `wss://<host>/v1/agent/<agent_id>/websocket` or `ws://...`.
    pub fn websocket_url(&self) -> Result<String, crate::error::TransportError> {
        let scheme = if self.base_url.starts_with("https://") {
            "wss"
        } else if self.base_url.starts_with("http://") {
            "ws"
        } else {
            return Err(crate::error::TransportError::InvalidBaseUrl(self.base_url.clone()));
        };
        let host = self
            .base_url
            .splitn(2, "://")
            .nth(1)
            .ok_or_else(|| crate::error::TransportError::InvalidBaseUrl(self.base_url.clone()))?
            .trim_end_matches('/');
        Ok(format!("{scheme}://{host}/v1/agent/{}/websocket", self.agent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_base_yields_wss_scheme() {
        let cfg = TransportConfig::new("https://control.example.com", "a1", "tok");
        assert_eq!(cfg.websocket_url().unwrap(), "wss://control.example.com/v1/agent/a1/websocket");
    }

    #[test]
    fn http_base_yields_ws_scheme() {
        let cfg = TransportConfig::new("http://localhost:8080", "a1", "tok");
        assert_eq!(cfg.websocket_url().unwrap(), "ws://localhost:8080/v1/agent/a1/websocket");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let cfg = TransportConfig::new("ftp://nope", "a1", "tok");
        assert!(cfg.websocket_url().is_err());
    }
}
