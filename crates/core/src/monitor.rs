// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide monitor counters.

/// Cumulative counters maintained by the proxy supervisor's monitor sweep.
/// Guarded by the monitor's own lock; callers never hold it across a
/// blocking operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorStats {
    pub total_checks: u64,
    pub total_restarts: u64,
    pub successful_restarts: u64,
    pub failed_restarts: u64,
    pub last_sweep_millis: Option<i64>,
}

impl MonitorStats {
    pub fn record_sweep(&mut self, now_millis: i64) {
        self.total_checks += 1;
        self.last_sweep_millis = Some(now_millis);
    }

    pub fn record_restart_attempt(&mut self, success: bool) {
        self.total_restarts += 1;
        if success {
            self.successful_restarts += 1;
        } else {
            self.failed_restarts += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_attempts_update_success_and_failure_counts() {
        let mut stats = MonitorStats::default();
        stats.record_restart_attempt(true);
        stats.record_restart_attempt(false);
        stats.record_restart_attempt(false);
        assert_eq!(stats.total_restarts, 3);
        assert_eq!(stats.successful_restarts, 1);
        assert_eq!(stats.failed_restarts, 2);
    }
}
