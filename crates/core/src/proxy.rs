// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy instance state: one supervised child process per egress id.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned egress identifier (opaque format, not guaranteed to fit
/// the inline [`crate::id::IdBuf`] budget — see [`crate::task::TaskId`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EgressId(pub String);

impl EgressId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EgressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EgressId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EgressId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for EgressId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One of the three supported proxy protocol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyVariant {
    Shadowsocks2022,
    Trojan,
    Snell,
}

crate::simple_display! {
    ProxyVariant {
        Shadowsocks2022 => "SHADOWSOCKS_2022",
        Trojan => "TROJAN",
        Snell => "SNELL",
    }
}

impl ProxyVariant {
    /// The file-name stem used for config/pid paths (`<stem>-<egress-id>.*`).
    pub fn file_stem(self) -> &'static str {
        match self {
            ProxyVariant::Shadowsocks2022 => "shadowsocks",
            ProxyVariant::Trojan => "trojan",
            ProxyVariant::Snell => "snell",
        }
    }
}

/// Observed status of a proxy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Unknown,
    Running,
    Stopped,
    Crashed,
    Restarting,
}

crate::simple_display! {
    InstanceStatus {
        Unknown => "UNKNOWN",
        Running => "RUNNING",
        Stopped => "STOPPED",
        Crashed => "CRASHED",
        Restarting => "RESTARTING",
    }
}

/// Status reported by `ProxyInstance::status()`: a coarser 3-valued view
/// distinct from the supervisor's richer [`InstanceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    NotInstalled,
    Running,
    Stopped,
}

/// One entry in an instance's restart history ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartRecord {
    pub at_millis: i64,
    pub reason: String,
    pub success: bool,
    pub duration_millis: u64,
}

/// Maximum number of restart records retained per instance.
pub const MAX_RESTART_HISTORY: usize = 100;

/// Bounded ring buffer of restart records. Oldest entries are evicted once
/// the buffer is full; it never exceeds [`MAX_RESTART_HISTORY`] entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestartHistory(VecDeque<RestartRecord>);

impl RestartHistory {
    pub fn push(&mut self, record: RestartRecord) {
        if self.0.len() >= MAX_RESTART_HISTORY {
            self.0.pop_front();
        }
        self.0.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RestartRecord> {
        self.0.iter()
    }

    /// Count of restarts whose timestamp falls within the last `window_millis`.
    pub fn count_since(&self, now_millis: i64, window_millis: i64) -> usize {
        self.0.iter().filter(|r| now_millis.saturating_sub(r.at_millis) < window_millis).count()
    }

    pub fn last(&self) -> Option<&RestartRecord> {
        self.0.back()
    }
}

/// Full state tracked for one supervised proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyInstanceState {
    pub egress_id: EgressId,
    pub variant: ProxyVariant,
    pub config_blob: serde_json::Value,
    pub config_path: std::path::PathBuf,
    pub pid_file_path: std::path::PathBuf,
    pub status: InstanceStatus,
    pub last_check_millis: Option<i64>,
    pub last_restart_millis: Option<i64>,
    pub restart_count: u64,
    pub history: RestartHistory,
    pub enabled: bool,
}

impl ProxyInstanceState {
    pub fn new(
        egress_id: EgressId,
        variant: ProxyVariant,
        config_blob: serde_json::Value,
        config_path: std::path::PathBuf,
        pid_file_path: std::path::PathBuf,
    ) -> Self {
        Self {
            egress_id,
            variant,
            config_blob,
            config_path,
            pid_file_path,
            status: InstanceStatus::Unknown,
            last_check_millis: None,
            last_restart_millis: None,
            restart_count: 0,
            history: RestartHistory::default(),
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(at_millis: i64, success: bool) -> RestartRecord {
        RestartRecord { at_millis, reason: "crash".into(), success, duration_millis: 10 }
    }

    #[test]
    fn history_never_exceeds_cap() {
        let mut h = RestartHistory::default();
        for i in 0..(MAX_RESTART_HISTORY + 20) {
            h.push(record(i as i64, true));
        }
        assert_eq!(h.len(), MAX_RESTART_HISTORY);
        // oldest entries evicted first
        assert_eq!(h.iter().next().unwrap().at_millis, 20);
    }

    #[test]
    fn count_since_respects_window() {
        let mut h = RestartHistory::default();
        h.push(record(0, true));
        h.push(record(1_000, true));
        h.push(record(5_000, false));
        assert_eq!(h.count_since(5_000, 4_001), 2);
        assert_eq!(h.count_since(5_000, 10_000), 3);
    }
}
