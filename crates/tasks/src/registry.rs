// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task registry: the single-lock task-id -> task-record map giving
//! at-most-once execution semantics to re-deliverable `TASK` envelopes.

use std::collections::HashMap;

use nspass_core::{TaskId, TaskRecord, TaskStatus, TaskType, TASK_RECORD_MAX_AGE_MILLIS};
use parking_lot::Mutex;

/// What the dispatcher should do with a freshly-received `TASK` envelope.
pub enum Begin {
    /// No record existed, or it was `PENDING`/`FAILED`: execute the task
    /// body. The contained record is already `PENDING` in the registry.
    Execute(TaskRecord),
    /// The record was already `COMPLETED`: replay its stored result
    /// verbatim without re-executing.
    ReplayCompleted(TaskRecord),
    /// The record is `RUNNING` or `CANCELLED`: report a synthetic
    /// `RUNNING` result without executing.
    SyntheticRunning,
}

#[derive(Default)]
pub struct TaskRegistry {
    records: Mutex<HashMap<TaskId, TaskRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult the registry for `id`, evicting expired terminal records
    /// opportunistically first, and decide what the dispatcher should do.
    pub fn begin(&self, id: TaskId, task_type: TaskType, now_millis: i64) -> Begin {
        let mut records = self.records.lock();
        records.retain(|_, rec| !rec.is_evictable(now_millis, TASK_RECORD_MAX_AGE_MILLIS));

        match records.get_mut(&id) {
            None => {
                let record = TaskRecord::new_pending(id.clone(), task_type, now_millis);
                records.insert(id, record.clone());
                Begin::Execute(record)
            }
            Some(rec) if rec.status == TaskStatus::Completed => Begin::ReplayCompleted(rec.clone()),
            Some(rec) if rec.status == TaskStatus::Running => Begin::SyntheticRunning,
            Some(rec) if rec.status == TaskStatus::Cancelled => Begin::SyntheticRunning,
            Some(rec) => {
                // PENDING or FAILED: retry.
                rec.retry_count += 1;
                rec.status = TaskStatus::Pending;
                Begin::Execute(rec.clone())
            }
        }
    }

    pub fn mark_running(&self, id: &TaskId, now_millis: i64) {
        if let Some(rec) = self.records.lock().get_mut(id) {
            rec.status = TaskStatus::Running;
            rec.started_at_millis = Some(now_millis);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn complete(
        &self,
        id: &TaskId,
        status: TaskStatus,
        output: String,
        result: Option<serde_json::Value>,
        error_message: Option<String>,
        now_millis: i64,
    ) {
        if let Some(rec) = self.records.lock().get_mut(id) {
            rec.status = status;
            rec.completed_at_millis = Some(now_millis);
            rec.output = Some(output);
            rec.result = result;
            rec.error_message = error_message;
        }
    }

    pub fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.records.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl nspass_metrics::TaskStatusSource for TaskRegistry {
    fn counts_by_status(&self) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        for rec in self.records.lock().values() {
            *counts.entry(rec.status.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_record_is_created_pending_and_executed() {
        let registry = TaskRegistry::new();
        match registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 1_000) {
            Begin::Execute(rec) => assert_eq!(rec.status, TaskStatus::Pending),
            _ => panic!("expected Execute"),
        }
    }

    #[test]
    fn completed_record_is_replayed_not_reexecuted() {
        let registry = TaskRegistry::new();
        registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 1_000);
        registry.mark_running(&TaskId::from("t1"), 1_001);
        registry.complete(&TaskId::from("t1"), TaskStatus::Completed, "done".to_string(), None, None, 1_002);

        match registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 2_000) {
            Begin::ReplayCompleted(rec) => assert_eq!(rec.status, TaskStatus::Completed),
            _ => panic!("expected ReplayCompleted"),
        }
    }

    #[test]
    fn running_record_yields_synthetic_running_without_executing() {
        let registry = TaskRegistry::new();
        registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 1_000);
        registry.mark_running(&TaskId::from("t1"), 1_001);

        assert!(matches!(registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 1_500), Begin::SyntheticRunning));
    }

    #[test]
    fn cancelled_record_yields_synthetic_running_to_signal_dont_retry() {
        let registry = TaskRegistry::new();
        registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 1_000);
        registry.complete(&TaskId::from("t1"), TaskStatus::Cancelled, "cancelled".to_string(), None, None, 1_001);

        assert!(matches!(registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 1_500), Begin::SyntheticRunning));
    }

    #[test]
    fn failed_record_is_retried_with_incremented_count() {
        let registry = TaskRegistry::new();
        registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 1_000);
        registry.complete(&TaskId::from("t1"), TaskStatus::Failed, "task execution failed".to_string(), None, Some("boom".into()), 1_001);

        match registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 2_000) {
            Begin::Execute(rec) => {
                assert_eq!(rec.status, TaskStatus::Pending);
                assert_eq!(rec.retry_count, 1);
            }
            _ => panic!("expected Execute"),
        }
    }

    #[test]
    fn old_terminal_records_are_evicted_on_arrival() {
        let registry = TaskRegistry::new();
        registry.begin(TaskId::from("t1"), TaskType::HealthCheck, 0);
        registry.complete(&TaskId::from("t1"), TaskStatus::Completed, "done".to_string(), None, None, 0);

        registry.begin(TaskId::from("t2"), TaskType::HealthCheck, TASK_RECORD_MAX_AGE_MILLIS + 1);
        assert!(registry.get(&TaskId::from("t1")).is_none());
    }
}
