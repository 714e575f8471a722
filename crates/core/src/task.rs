// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records: server-issued work items with at-most-once execution semantics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned task identifier. Unlike [`crate::id::IdBuf`]-backed ids,
/// the wire format of a task id is opaque to the agent and not guaranteed to
/// fit the 23-byte inline budget, so this is a plain owned-string newtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    ConfigUpdate,
    Restart,
    SyncRules,
    SyncUsers,
    CollectMetrics,
    HealthCheck,
}

crate::simple_display! {
    TaskType {
        ConfigUpdate => "CONFIG_UPDATE",
        Restart => "RESTART",
        SyncRules => "SYNC_RULES",
        SyncUsers => "SYNC_USERS",
        CollectMetrics => "COLLECT_METRICS",
        HealthCheck => "HEALTH_CHECK",
    }
}

/// Lifecycle status of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses are never re-executed; their result is replayed verbatim.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

crate::simple_display! {
    TaskStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
    }
}

/// A single tracked task, keyed by [`TaskId`] in the dispatcher's registry.
///
/// Once `status` reaches a terminal value the record is immutable except for
/// eviction; redelivery of the same task id must return `output`/`result`/
/// `error_message` verbatim rather than re-running the task body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub created_at_millis: i64,
    pub started_at_millis: Option<i64>,
    pub completed_at_millis: Option<i64>,
    pub retry_count: u32,
    pub output: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl TaskRecord {
    pub fn new_pending(id: TaskId, task_type: TaskType, now_millis: i64) -> Self {
        Self {
            id,
            task_type,
            status: TaskStatus::Pending,
            created_at_millis: now_millis,
            started_at_millis: None,
            completed_at_millis: None,
            retry_count: 0,
            output: None,
            result: None,
            error_message: None,
        }
    }

    /// Whether this record is eligible for opportunistic eviction: terminal
    /// and older than `max_age_millis`.
    pub fn is_evictable(&self, now_millis: i64, max_age_millis: i64) -> bool {
        self.status.is_terminal()
            && self
                .completed_at_millis
                .map(|t| now_millis.saturating_sub(t) >= max_age_millis)
                .unwrap_or(false)
    }
}

/// 24 hours, in milliseconds — the terminal-record eviction age.
pub const TASK_RECORD_MAX_AGE_MILLIS: i64 = 24 * 60 * 60 * 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_not_evictable() {
        let rec = TaskRecord::new_pending(TaskId::from("t1"), TaskType::HealthCheck, 1_000);
        assert!(!rec.is_evictable(2_000, TASK_RECORD_MAX_AGE_MILLIS));
    }

    #[test]
    fn old_terminal_record_is_evictable() {
        let mut rec = TaskRecord::new_pending(TaskId::from("t1"), TaskType::HealthCheck, 0);
        rec.status = TaskStatus::Completed;
        rec.completed_at_millis = Some(0);
        assert!(rec.is_evictable(TASK_RECORD_MAX_AGE_MILLIS + 1, TASK_RECORD_MAX_AGE_MILLIS));
    }

    #[test]
    fn non_terminal_record_is_never_evictable() {
        let mut rec = TaskRecord::new_pending(TaskId::from("t1"), TaskType::HealthCheck, 0);
        rec.status = TaskStatus::Failed;
        assert!(!rec.is_evictable(i64::MAX, TASK_RECORD_MAX_AGE_MILLIS));
    }
}
