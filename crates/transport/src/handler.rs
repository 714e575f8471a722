// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pluggable task handler and metrics collector supplied at
//! construction.

use std::sync::Arc;

use async_trait::async_trait;
use nspass_core::{DeclaredEgressItem, DeclaredRule};
use nspass_metrics::{MetricsCollector, TaskStatusSource};
use nspass_wire::{EgressAckPayload, FilterAckPayload, MetricsPayload, TaskPayload, TaskResultPayload};

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle_task(&self, task: TaskPayload, now_millis: i64) -> TaskResultPayload;
}

#[async_trait]
impl TaskHandler for nspass_tasks::TaskDispatcher {
    async fn handle_task(&self, task: TaskPayload, now_millis: i64) -> TaskResultPayload {
        self.dispatch(task, now_millis).await
    }
}

/// Handles an `EGRESS_CONFIG` push, producing the acknowledgement payload
/// sent back on the same connection.
#[async_trait]
pub trait EgressConfigHandler: Send + Sync {
    async fn handle_egress_config(&self, items: Vec<DeclaredEgressItem>) -> EgressAckPayload;
}

#[async_trait]
impl EgressConfigHandler for nspass_egress::EgressReconciler {
    async fn handle_egress_config(&self, items: Vec<DeclaredEgressItem>) -> EgressAckPayload {
        let ack = self.apply(items).await;
        EgressAckPayload {
            success: ack.failed == 0,
            applied_egress_count: ack.succeeded,
            failed_egress_count: ack.failed,
            detail: ack
                .results
                .into_iter()
                .map(|r| nspass_wire::EgressItemResult { egress_id: r.egress_id, success: r.success, error: r.error })
                .collect(),
        }
    }
}

/// Handles a `FILTER_CONFIG` push, driving every configured per-address-
/// family reconciler (one instance per address family).
#[async_trait]
pub trait FilterConfigHandler: Send + Sync {
    async fn handle_filter_config(&self, rules: Vec<DeclaredRule>, now_millis: i64) -> FilterAckPayload;
}

pub struct FilterReconcilers(pub Vec<Arc<nspass_netfilter::Reconciler>>);

#[async_trait]
impl FilterConfigHandler for FilterReconcilers {
    async fn handle_filter_config(&self, rules: Vec<DeclaredRule>, now_millis: i64) -> FilterAckPayload {
        for reconciler in &self.0 {
            if let Err(e) = reconciler.update_rules(&rules, now_millis).await {
                return FilterAckPayload { success: false, applied_rule_count: 0, error: Some(e.to_string()) };
            }
        }
        FilterAckPayload { success: true, applied_rule_count: rules.len(), error: None }
    }
}

pub trait MetricsSource: Send + Sync {
    fn sample(&self, now_millis: i64) -> Vec<MetricsPayload>;
}

/// Adapts [`MetricsCollector`] (which needs a task-status breakdown) to the
/// transport's narrower [`MetricsSource`] contract.
pub struct CollectorMetricsSource {
    collector: Arc<MetricsCollector>,
    task_status: Arc<dyn TaskStatusSource>,
}

impl CollectorMetricsSource {
    pub fn new(collector: Arc<MetricsCollector>, task_status: Arc<dyn TaskStatusSource>) -> Self {
        Self { collector, task_status }
    }
}

impl MetricsSource for CollectorMetricsSource {
    fn sample(&self, now_millis: i64) -> Vec<MetricsPayload> {
        self.collector.sample_all(now_millis, self.task_status.as_ref())
    }
}
