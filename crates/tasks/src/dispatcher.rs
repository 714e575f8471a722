// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatcher: wires the registry to the handlers and produces the
//! `ACK` result every `TASK` envelope gets.

use std::sync::Arc;

use nspass_core::{TaskStatus, TaskType};
use nspass_egress::EgressReconciler;
use nspass_metrics::MetricsCollector;
use nspass_netfilter::Reconciler;
use nspass_supervisor::Supervisor;
use nspass_wire::{Envelope, MessageType, MetricsPayload, Payload, TaskPayload, TaskResultPayload};
use tracing::{info, warn};

use crate::handlers;
use crate::registry::{Begin, TaskRegistry};
use crate::restart::AgentRestarter;
use crate::sink::EnvelopeSink;

/// Everything a [`TaskDispatcher`] needs to execute every task type. Bundled
/// into one struct so callers don't have to thread five `Arc`s through
/// construction individually.
pub struct DispatcherDeps {
    pub egress: Arc<EgressReconciler>,
    pub filter_reconcilers: Vec<Arc<Reconciler>>,
    pub supervisor: Arc<Supervisor>,
    pub metrics: Arc<MetricsCollector>,
    pub agent_restarter: Arc<dyn AgentRestarter>,
    pub outbound: Arc<dyn EnvelopeSink>,
}

pub struct TaskDispatcher {
    registry: Arc<TaskRegistry>,
    deps: DispatcherDeps,
}

impl TaskDispatcher {
    pub fn new(registry: Arc<TaskRegistry>, deps: DispatcherDeps) -> Self {
        Self { registry, deps }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Handle one inbound `TASK` envelope, returning the payload for the
    /// answering `ACK`.
    ///
    /// Long-running tasks are expected to be driven from a detached
    /// `tokio::spawn` by the caller — this method itself just awaits the
    /// task body to completion, it does not spawn.
    pub async fn dispatch(&self, task: TaskPayload, now_millis: i64) -> TaskResultPayload {
        match self.registry.begin(task.task_id.clone(), task.task_type, now_millis) {
            Begin::ReplayCompleted(rec) => to_result(rec),
            Begin::SyntheticRunning => TaskResultPayload {
                task_id: task.task_id,
                status: TaskStatus::Running,
                output: "task is already running or was cancelled; not re-executed".to_string(),
                result: None,
                error_message: None,
            },
            Begin::Execute(_) => self.execute(task, now_millis).await,
        }
    }

    async fn execute(&self, task: TaskPayload, now_millis: i64) -> TaskResultPayload {
        self.registry.mark_running(&task.task_id, now_millis);

        let outcome = self.run_task_body(task.task_type, task.payload.clone(), now_millis).await;

        let (status, output, result, error_message) = match outcome {
            Ok((output, result)) => (TaskStatus::Completed, output, result, None),
            Err(e) => {
                warn!(task_id = %task.task_id, task_type = %task.task_type, error = %e, "task execution failed");
                (TaskStatus::Failed, "task execution failed".to_string(), None, Some(e.to_string()))
            }
        };

        self.registry.complete(&task.task_id, status, output.clone(), result.clone(), error_message.clone(), now_millis);
        info!(task_id = %task.task_id, task_type = %task.task_type, %status, "task execution finished");

        TaskResultPayload { task_id: task.task_id, status, output, result, error_message }
    }

    async fn run_task_body(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        now_millis: i64,
    ) -> Result<(String, Option<serde_json::Value>), crate::error::DispatchError> {
        match task_type {
            TaskType::ConfigUpdate => {
                let output = handlers::config_update(
                    payload,
                    &self.deps.egress,
                    &self.deps.filter_reconcilers,
                    &self.deps.supervisor,
                    now_millis,
                )
                .await?;
                Ok((output, None))
            }
            TaskType::Restart => {
                let output = handlers::restart(payload, &self.deps.supervisor, self.deps.agent_restarter.as_ref()).await?;
                Ok((output, None))
            }
            TaskType::SyncRules => Ok((handlers::sync(payload, "SYNC_RULES")?, None)),
            TaskType::SyncUsers => Ok((handlers::sync(payload, "SYNC_USERS")?, None)),
            TaskType::CollectMetrics => {
                let payloads = self.deps.metrics.sample_all(now_millis, self.registry.as_ref());
                self.send_metrics(payloads, now_millis);
                Ok(("collected and sent metrics sample".to_string(), None))
            }
            TaskType::HealthCheck => {
                let (healthy, detail) =
                    handlers::health_check(payload, &self.deps.supervisor, &self.deps.filter_reconcilers).await?;
                if healthy {
                    Ok((detail, None))
                } else {
                    Err(crate::error::DispatchError::HealthCheckFailed(detail))
                }
            }
        }
    }

    fn send_metrics(&self, payloads: Vec<MetricsPayload>, now_millis: i64) {
        for payload in payloads {
            let envelope = Envelope::new(MessageType::Metrics, now_millis, Payload::Metrics(payload));
            self.deps.outbound.send(envelope);
        }
    }
}

fn to_result(rec: nspass_core::TaskRecord) -> TaskResultPayload {
    TaskResultPayload {
        task_id: rec.id,
        status: rec.status,
        output: rec.output.unwrap_or_default(),
        result: rec.result,
        error_message: rec.error_message,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use nspass_core::{SystemClock, TaskId};
    use nspass_supervisor::BinaryPaths;
    use tempfile::tempdir;

    use super::*;
    use crate::restart::NoopRestarter;

    struct CapturingSink {
        sent: StdMutex<Vec<Envelope>>,
    }

    impl CapturingSink {
        fn new() -> Self {
            Self { sent: StdMutex::new(Vec::new()) }
        }
    }

    impl EnvelopeSink for CapturingSink {
        fn send(&self, envelope: Envelope) {
            self.sent.lock().unwrap().push(envelope);
        }
    }

    fn new_dispatcher(sink: Arc<CapturingSink>) -> (TaskDispatcher, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let supervisor = Arc::new(Supervisor::new(
            dir.path().to_path_buf(),
            BinaryPaths {
                shadowsocks: std::path::PathBuf::from("/nonexistent/ss"),
                trojan: std::path::PathBuf::from("/nonexistent/trojan"),
                snell: std::path::PathBuf::from("/nonexistent/snell"),
            },
            Arc::new(SystemClock),
        ));
        let deps = DispatcherDeps {
            egress: Arc::new(EgressReconciler::new(supervisor.clone())),
            filter_reconcilers: Vec::new(),
            supervisor,
            metrics: Arc::new(MetricsCollector::new()),
            agent_restarter: Arc::new(NoopRestarter::default()),
            outbound: sink,
        };
        (TaskDispatcher::new(Arc::new(TaskRegistry::new()), deps), dir)
    }

    #[tokio::test]
    async fn health_check_with_no_registered_proxies_and_no_reconcilers_is_healthy() {
        let (dispatcher, _dir) = new_dispatcher(Arc::new(CapturingSink::new()));
        let task = TaskPayload {
            task_id: TaskId::from("t1"),
            task_type: TaskType::HealthCheck,
            payload: serde_json::json!({"probes": ["system", "proxy", "iptables"]}),
        };
        let result = dispatcher.dispatch(task, 1_000).await;
        assert_eq!(result.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn sync_rules_reports_completed_with_echoed_count() {
        let (dispatcher, _dir) = new_dispatcher(Arc::new(CapturingSink::new()));
        let task = TaskPayload {
            task_id: TaskId::from("t1"),
            task_type: TaskType::SyncRules,
            payload: serde_json::json!({"expected_count": 3}),
        };
        let result = dispatcher.dispatch(task, 1_000).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.output.contains('3'));
    }

    #[tokio::test]
    async fn collect_metrics_sends_five_metrics_frames() {
        let sink = Arc::new(CapturingSink::new());
        let (dispatcher, _dir) = new_dispatcher(sink.clone());
        let task =
            TaskPayload { task_id: TaskId::from("t1"), task_type: TaskType::CollectMetrics, payload: serde_json::Value::Null };
        let result = dispatcher.dispatch(task, 1_000).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(sink.sent.lock().unwrap().len(), 5);
        assert!(sink.sent.lock().unwrap().iter().all(|e| e.kind == MessageType::Metrics));
    }

    #[tokio::test]
    async fn redelivering_a_completed_task_replays_without_reexecuting() {
        let (dispatcher, _dir) = new_dispatcher(Arc::new(CapturingSink::new()));
        let task = TaskPayload {
            task_id: TaskId::from("t1"),
            task_type: TaskType::SyncUsers,
            payload: serde_json::json!({"expected_count": 1}),
        };
        let first = dispatcher.dispatch(task.clone(), 1_000).await;
        let second = dispatcher.dispatch(task, 2_000).await;
        assert_eq!(first.output, second.output);
        assert_eq!(second.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn restart_agent_invokes_the_agent_restarter() {
        let (dispatcher, _dir) = new_dispatcher(Arc::new(CapturingSink::new()));
        let task = TaskPayload {
            task_id: TaskId::from("t1"),
            task_type: TaskType::Restart,
            payload: serde_json::json!({"service": "agent"}),
        };
        let result = dispatcher.dispatch(task, 1_000).await;
        assert_eq!(result.status, TaskStatus::Completed);
    }
}
