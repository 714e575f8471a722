// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper turning an `EGRESS_CONFIG` push into a [`Supervisor`]
//! convergence call and an acknowledgement summary.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use nspass_core::{DeclaredEgressItem, EgressId};
use nspass_supervisor::{InstanceError, Supervisor, SupervisorError};
use serde::Serialize;
use tracing::info;

/// Per-item result reported back in an `EGRESS_CONFIG` acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct EgressItemResult {
    pub egress_id: EgressId,
    pub success: bool,
    pub error: Option<String>,
}

/// Acknowledgement summary for one `EGRESS_CONFIG` push.
#[derive(Debug, Clone, Serialize)]
pub struct EgressAck {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<EgressItemResult>,
}

/// Applies a declared egress-process list to the supervisor and produces the
/// acknowledgement the transport layer sends back upstream.
pub struct EgressReconciler {
    supervisor: Arc<Supervisor>,
}

impl EgressReconciler {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    /// Converge to `declared` and summarise the outcome per item. Items not
    /// named in a [`SupervisorError::PartialFailure`] are reported as
    /// succeeded, since [`Supervisor::update_proxies`] only returns the
    /// failing subset.
    pub async fn apply(&self, declared: Vec<DeclaredEgressItem>) -> EgressAck {
        let total = declared.len();
        let ids: Vec<EgressId> = declared.iter().map(|item| item.egress_id.clone()).collect();

        let failures = match self.supervisor.update_proxies(declared).await {
            Ok(()) => Vec::new(),
            Err(SupervisorError::PartialFailure { failures, .. }) => failures,
        };

        let results: Vec<EgressItemResult> = ids
            .into_iter()
            .map(|id| match failures.iter().find(|(failed_id, _)| *failed_id == id) {
                Some((_, err)) => EgressItemResult { egress_id: id, success: false, error: Some(format_error(err)) },
                None => EgressItemResult { egress_id: id, success: true, error: None },
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        info!(total, succeeded, failed, "egress reconciliation applied");

        EgressAck { total, succeeded, failed, results }
    }
}

fn format_error(err: &InstanceError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nspass_core::{EgressOverrides, ProtocolConfig, ProxyVariant, SystemClock};
    use nspass_supervisor::BinaryPaths;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn new_supervisor() -> Arc<Supervisor> {
        let dir = tempdir().unwrap();
        Arc::new(Supervisor::new(
            dir.path().to_path_buf(),
            BinaryPaths {
                shadowsocks: PathBuf::from("/nonexistent/ss"),
                trojan: PathBuf::from("/nonexistent/trojan"),
                snell: PathBuf::from("/nonexistent/snell"),
            },
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn uninstalled_binary_is_reported_as_a_failed_item() {
        let reconciler = EgressReconciler::new(new_supervisor());
        let declared = vec![DeclaredEgressItem {
            egress_id: EgressId::from("e1"),
            config: ProtocolConfig::Snell { psk: "k".into(), port: None, obfs: None },
            overrides: EgressOverrides::default(),
        }];

        let ack = reconciler.apply(declared).await;
        assert_eq!(ack.total, 1);
        assert_eq!(ack.failed, 1);
        assert!(!ack.results[0].success);
        assert!(ack.results[0].error.is_some());
    }

    #[tokio::test]
    async fn empty_push_acknowledges_with_zero_counts() {
        let reconciler = EgressReconciler::new(new_supervisor());
        let ack = reconciler.apply(vec![]).await;
        assert_eq!(ack.total, 0);
        assert_eq!(ack.succeeded, 0);
        assert_eq!(ack.failed, 0);
    }

    #[test]
    fn variant_is_reexported_for_callers() {
        let _ = ProxyVariant::Snell;
    }
}
