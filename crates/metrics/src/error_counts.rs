// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cumulative error counters for the `ERROR` metrics kind. Placeholder
//! semantics are acceptable here; a fuller implementation would wire these
//! into logging hooks.

use std::collections::HashMap;

use nspass_wire::ErrorMetrics;
use parking_lot::Mutex;

/// A handle other components can clone and increment from their own error
/// paths. Backed by a single short-held lock for a process-wide counter
/// map.
#[derive(Default)]
pub struct ErrorCounters {
    counts: Mutex<HashMap<String, u64>>,
}

impl ErrorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for an error class (e.g. `"transport"`,
    /// `"reconcile"`, `"supervisor"`).
    pub fn record(&self, class: &str) {
        *self.counts.lock().entry(class.to_string()).or_insert(0) += 1;
    }

    pub fn sample(&self) -> ErrorMetrics {
        ErrorMetrics { counts_by_class: self.counts.lock().clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_per_class() {
        let counters = ErrorCounters::new();
        counters.record("transport");
        counters.record("transport");
        counters.record("reconcile");
        let sample = counters.sample();
        assert_eq!(sample.counts_by_class.get("transport"), Some(&2));
        assert_eq!(sample.counts_by_class.get("reconcile"), Some(&1));
    }
}
