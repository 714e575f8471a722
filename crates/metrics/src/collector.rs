// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundles the five metrics kinds behind a single collector that the
//! transport's metrics loop drives once per tick.

use nspass_wire::MetricsPayload;
use parking_lot::Mutex;
use sysinfo::System;

use crate::error_counts::ErrorCounters;
use crate::performance::TaskStatusSource;
use crate::traffic::TrafficSampler;
use crate::{connection, performance, system as system_metrics};

/// Owns the stateful samplers (the `sysinfo::System` handle and the
/// cumulative-counter deltas) so the caller only has to call
/// [`MetricsCollector::sample_all`] once per tick.
pub struct MetricsCollector {
    system: Mutex<System>,
    traffic: Mutex<TrafficSampler>,
    errors: ErrorCounters,
    last_tick_millis: Mutex<Option<i64>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            traffic: Mutex::new(TrafficSampler::new()),
            errors: ErrorCounters::new(),
            last_tick_millis: Mutex::new(None),
        }
    }

    pub fn error_counters(&self) -> &ErrorCounters {
        &self.errors
    }

    /// Sample all five metrics kinds, producing up to five `METRICS` frames
    /// (one per kind). `now_millis` drives both the traffic sampler's delta
    /// window and the system sampler's rate calculation, so both report the
    /// same period.
    pub fn sample_all(&self, now_millis: i64, task_status: &dyn TaskStatusSource) -> Vec<MetricsPayload> {
        let traffic = {
            let mut sampler = self.traffic.lock();
            sampler.sample(now_millis)
        };

        let elapsed_secs = {
            let mut last = self.last_tick_millis.lock();
            let elapsed = last.map(|prev| (now_millis.saturating_sub(prev)).max(0) as f64 / 1000.0).unwrap_or(0.0);
            *last = Some(now_millis);
            elapsed
        };

        let system = {
            let mut sys = self.system.lock();
            system_metrics::sample(&mut sys, traffic.bytes_in_delta, traffic.bytes_out_delta, elapsed_secs)
        };

        let performance = {
            let sys = self.system.lock();
            performance::sample(&sys, system.cpu_percent, task_status)
        };

        let connection = connection::sample();
        let error = self.errors.sample();

        vec![
            MetricsPayload::System(system),
            MetricsPayload::Traffic(traffic),
            MetricsPayload::Connection(connection),
            MetricsPayload::Performance(performance),
            MetricsPayload::Error(error),
        ]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct EmptyCounts;
    impl TaskStatusSource for EmptyCounts {
        fn counts_by_status(&self) -> HashMap<String, u64> {
            HashMap::new()
        }
    }

    #[test]
    fn sample_all_returns_one_payload_per_kind() {
        let collector = MetricsCollector::new();
        let payloads = collector.sample_all(1_000, &EmptyCounts);
        assert_eq!(payloads.len(), 5);
    }

    #[test]
    fn error_counters_are_reflected_in_next_sample() {
        let collector = MetricsCollector::new();
        collector.error_counters().record("transport");
        let payloads = collector.sample_all(1_000, &EmptyCounts);
        let error = payloads.iter().find_map(|p| match p {
            MetricsPayload::Error(e) => Some(e),
            _ => None,
        });
        assert_eq!(error.unwrap().counts_by_class.get("transport"), Some(&1));
    }
}
