// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative packet-filter rules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned packet-filter rule identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The embedded comment tag every agent-owned rule carries.
    pub fn tag(&self) -> String {
        format!("NSPass:{}", self.0)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The prefix shared by every agent-owned tag, used to identify and prune
/// previously-agent-tagged rules regardless of which rule id they carry.
pub const TAG_PREFIX: &str = "NSPass:";

/// The prefix every agent-created custom chain name begins with, used to
/// prune stale chains the agent previously created. Configurable in
/// principle; fixed here since nothing threads a per-deployment override
/// through yet.
pub const CHAIN_PREFIX: &str = "NSPASS_";

/// One of the four kernel packet-filter tables, in the fixed serialization
/// order used for save-format output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterTable {
    Raw,
    Mangle,
    Nat,
    Filter,
}

impl FilterTable {
    /// Fixed table order for the serialised save-format output.
    pub const ORDER: [FilterTable; 4] =
        [FilterTable::Raw, FilterTable::Mangle, FilterTable::Nat, FilterTable::Filter];

    pub fn name(self) -> &'static str {
        match self {
            FilterTable::Raw => "raw",
            FilterTable::Mangle => "mangle",
            FilterTable::Nat => "nat",
            FilterTable::Filter => "filter",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "raw" => Some(FilterTable::Raw),
            "mangle" => Some(FilterTable::Mangle),
            "nat" => Some(FilterTable::Nat),
            "filter" => Some(FilterTable::Filter),
            _ => None,
        }
    }
}

impl fmt::Display for FilterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a declared rule should be appended or inserted at the head of its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Add,
    Insert,
}

/// A rule the control plane has declared the agent should maintain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredRule {
    pub id: RuleId,
    pub table: FilterTable,
    pub chain: String,
    /// Rule body in the kernel utility's own syntax, e.g. `-p tcp --dport 80 -j ACCEPT`.
    pub rule: String,
    pub action: RuleAction,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_is_raw_mangle_nat_filter() {
        assert_eq!(
            FilterTable::ORDER,
            [FilterTable::Raw, FilterTable::Mangle, FilterTable::Nat, FilterTable::Filter]
        );
    }

    #[test]
    fn tag_embeds_rule_id() {
        let id = RuleId::from("r1");
        assert_eq!(id.tag(), "NSPass:r1");
    }

    #[test]
    fn parse_round_trips_all_names() {
        for t in FilterTable::ORDER {
            assert_eq!(FilterTable::parse(t.name()), Some(t));
        }
    }
}
