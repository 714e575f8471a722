// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process/runtime sampling for the `PERFORMANCE` metrics kind.

use std::collections::HashMap;

use nspass_wire::PerformanceMetrics;
use sysinfo::System;

/// Supplies the task-status breakdown folded into performance metrics.
/// Implemented by `nspass_tasks::TaskRegistry` downstream; kept as a trait
/// here so `nspass-metrics` never depends on `nspass-tasks` (the dependency
/// direction runs the other way).
pub trait TaskStatusSource: Send + Sync {
    /// Counts keyed by the `SCREAMING_SNAKE_CASE` status name
    /// (`PENDING`, `RUNNING`, `COMPLETED`, `FAILED`, `CANCELLED`).
    fn counts_by_status(&self) -> HashMap<String, u64>;
}

/// Sample process/runtime performance metrics.
///
/// `system` must already have had [`sysinfo::System::refresh_processes`]
/// (or an equivalent full refresh) called for the current pid's RSS to be
/// current.
pub fn sample(system: &System, cpu_percent: f64, task_status: &dyn TaskStatusSource) -> PerformanceMetrics {
    let heap_bytes = sysinfo::get_current_pid()
        .ok()
        .and_then(|pid| system.process(pid))
        .map(|p| p.memory())
        .unwrap_or(0);

    // Rust has no goroutine scheduler; the nearest analogue to the source's
    // worker count is the Tokio runtime's configured parallelism, which in
    // the absence of a live `Handle::metrics()` (an unstable API) we
    // approximate with the host's available parallelism.
    let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

    PerformanceMetrics {
        heap_bytes,
        worker_count,
        gc_cycles: 0,
        cpu_percent,
        task_status_counts: task_status.counts_by_status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCounts;
    impl TaskStatusSource for FixedCounts {
        fn counts_by_status(&self) -> HashMap<String, u64> {
            HashMap::from([("COMPLETED".to_string(), 3), ("RUNNING".to_string(), 1)])
        }
    }

    #[test]
    fn folds_task_status_counts_into_metrics() {
        let system = System::new();
        let metrics = sample(&system, 12.5, &FixedCounts);
        assert_eq!(metrics.task_status_counts.get("COMPLETED"), Some(&3));
        assert_eq!(metrics.gc_cycles, 0);
        assert_eq!(metrics.cpu_percent, 12.5);
    }
}
