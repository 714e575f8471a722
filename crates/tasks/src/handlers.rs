// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One function per [`nspass_core::TaskType`], implementing each task's
//! execution semantics.

use std::sync::Arc;

use nspass_core::{DeclaredEgressItem, DeclaredRule};
use nspass_egress::EgressReconciler;
use nspass_netfilter::Reconciler;
use nspass_supervisor::Supervisor;

use crate::error::DispatchError;
use crate::payloads::{ConfigUpdateKind, ConfigUpdatePayload, HealthCheckPayload, RestartPayload, RestartTarget, SyncPayload};
use crate::restart::AgentRestarter;

fn malformed(task_type: &'static str, source: serde_json::Error) -> DispatchError {
    DispatchError::MalformedPayload { task_type, source }
}

/// `CONFIG_UPDATE`: delegate to the egress or filter reconciler, optionally
/// restarting all supervised proxies afterwards.
pub async fn config_update(
    raw: serde_json::Value,
    egress: &EgressReconciler,
    filter_reconcilers: &[Arc<Reconciler>],
    supervisor: &Supervisor,
    now_millis: i64,
) -> Result<String, DispatchError> {
    let payload: ConfigUpdatePayload = serde_json::from_value(raw).map_err(|e| malformed("CONFIG_UPDATE", e))?;

    let summary = match payload.kind {
        ConfigUpdateKind::Proxy => {
            let items: Vec<DeclaredEgressItem> =
                serde_json::from_value(payload.config).map_err(|e| malformed("CONFIG_UPDATE", e))?;
            let ack = egress.apply(items).await;
            format!("applied {} of {} declared egress items", ack.succeeded, ack.total)
        }
        ConfigUpdateKind::Iptables => {
            let rules: Vec<DeclaredRule> =
                serde_json::from_value(payload.config).map_err(|e| malformed("CONFIG_UPDATE", e))?;
            for reconciler in filter_reconcilers {
                reconciler.update_rules(&rules, now_millis).await?;
            }
            format!("applied {} declared filter rules", rules.len())
        }
    };

    if payload.restart_required {
        supervisor.restart_all().await?;
    }

    Ok(summary)
}

/// `RESTART`: restart all supervised proxies, or re-exec the agent via its
/// host service manager.
pub async fn restart(
    raw: serde_json::Value,
    supervisor: &Supervisor,
    agent_restarter: &dyn AgentRestarter,
) -> Result<String, DispatchError> {
    let payload: RestartPayload = serde_json::from_value(raw).map_err(|e| malformed("RESTART", e))?;
    match payload.service {
        RestartTarget::Proxy => {
            supervisor.restart_all().await?;
            Ok("restarted all supervised proxies".to_string())
        }
        RestartTarget::Agent => {
            agent_restarter.restart_agent().await?;
            Ok("requested agent restart via host service manager".to_string())
        }
    }
}

/// `SYNC_RULES`/`SYNC_USERS`: structured no-op, echoing the expected count
/// back (the actual sync happens via `FILTER_CONFIG`/a future users push).
pub fn sync(raw: serde_json::Value, task_type: &'static str) -> Result<String, DispatchError> {
    let payload: SyncPayload = if raw.is_null() {
        SyncPayload::default()
    } else {
        serde_json::from_value(raw).map_err(|e| malformed(task_type, e))?
    };
    Ok(format!("acknowledged {} expected items", payload.expected_count))
}

/// `HEALTH_CHECK`: run the named probes and AND their results.
pub async fn health_check(
    raw: serde_json::Value,
    supervisor: &Supervisor,
    filter_reconcilers: &[Arc<Reconciler>],
) -> Result<(bool, String), DispatchError> {
    let payload: HealthCheckPayload = serde_json::from_value(raw).map_err(|e| malformed("HEALTH_CHECK", e))?;

    let mut results = Vec::with_capacity(payload.probes.len());
    for probe in &payload.probes {
        let ok = match probe.as_str() {
            "system" => true,
            "proxy" => supervisor.all_running(),
            "iptables" => {
                let mut all_ok = true;
                for reconciler in filter_reconcilers {
                    all_ok &= reconciler.probe().await;
                }
                all_ok
            }
            other => {
                tracing::warn!(probe = other, "unknown health probe name, treating as failed");
                false
            }
        };
        results.push((probe.clone(), ok));
    }

    let healthy = results.iter().all(|(_, ok)| *ok);
    let detail = results.iter().map(|(name, ok)| format!("{name}={ok}")).collect::<Vec<_>>().join(", ");
    Ok((healthy, detail))
}
