// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed payloads carried by each [`crate::envelope::Envelope`] kind.

use std::collections::HashMap;

use nspass_core::{DeclaredEgressItem, DeclaredRule, TaskId, TaskType};
use serde::{Deserialize, Serialize};

/// A server-issued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub task_id: TaskId,
    pub task_type: TaskType,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Sent every 30s while connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub agent_id: String,
    pub timestamp_millis: i64,
    pub status: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// The terminal result of a task execution, carried on the `ACK` answering
/// a `TASK` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultPayload {
    pub task_id: TaskId,
    pub status: nspass_core::TaskStatus,
    pub output: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Summary reply to an `EGRESS_CONFIG` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressAckPayload {
    pub success: bool,
    pub applied_egress_count: usize,
    pub failed_egress_count: usize,
    pub detail: Vec<EgressItemResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressItemResult {
    pub egress_id: nspass_core::EgressId,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Summary reply to a `FILTER_CONFIG` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterAckPayload {
    pub success: bool,
    pub applied_rule_count: usize,
    #[serde(default)]
    pub error: Option<String>,
}

/// Carried on an `ERROR` frame answering any request the agent could not honor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// One of the five metrics kinds. `METRICS` frames are sent one-per-kind,
/// up to five per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "metric_kind", rename_all = "snake_case")]
pub enum MetricsPayload {
    System(SystemMetrics),
    Traffic(TrafficMetrics),
    Connection(ConnectionMetrics),
    Performance(PerformanceMetrics),
    Error(ErrorMetrics),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f64,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub disk_root_used_bytes: u64,
    pub disk_root_total_bytes: u64,
    pub load_average_1m: f64,
    pub process_count: usize,
    pub established_tcp_connections: usize,
    pub download_bytes_per_sec: u64,
    pub upload_bytes_per_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficMetrics {
    pub period_start_millis: i64,
    pub period_end_millis: i64,
    pub bytes_in_delta: u64,
    pub bytes_out_delta: u64,
    pub packets_in_delta: u64,
    pub packets_out_delta: u64,
    pub bandwidth_in_bytes_per_sec: f64,
    pub bandwidth_out_bytes_per_sec: f64,
    pub established_tcp_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub by_state: HashMap<String, usize>,
    pub top_remote_ips: Vec<RemoteIpCount>,
    pub udp_socket_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIpCount {
    pub ip: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub heap_bytes: u64,
    pub worker_count: usize,
    /// Always 0: Rust has no garbage collector. Retained as an explicit,
    /// documented no-op field rather than dropped silently.
    pub gc_cycles: u64,
    pub cpu_percent: f64,
    pub task_status_counts: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub counts_by_class: HashMap<String, u64>,
}

/// `EGRESS_CONFIG` push payload: the declared egress set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressConfigPayload {
    pub items: Vec<DeclaredEgressItem>,
}

/// `FILTER_CONFIG` push payload: the declared rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfigPayload {
    pub rules: Vec<DeclaredRule>,
}

/// Every payload shape any envelope kind may carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Task(TaskPayload),
    Heartbeat(HeartbeatPayload),
    TaskResult(TaskResultPayload),
    EgressAck(EgressAckPayload),
    FilterAck(FilterAckPayload),
    Error(ErrorPayload),
    Metrics(MetricsPayload),
    EgressConfig(EgressConfigPayload),
    FilterConfig(FilterConfigPayload),
}
