// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parse and serialise the kernel filter tables' save-format text
//! representation.
//!
//! ```text
//! *filter
//! :INPUT ACCEPT [0:0]
//! :FORWARD ACCEPT [0:0]
//! -A INPUT -p tcp --dport 22 -j ACCEPT
//! COMMIT
//! ```

use indexmap::IndexMap;
use nspass_core::FilterTable;

use crate::error::ReconcileError;

/// One chain's policy/counters header line (the `:chain policy counters` line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHeader {
    pub policy: String,
    pub counters: String,
}

impl ChainHeader {
    /// Header for a custom chain created to host a newly-referenced chain:
    /// policy `-` and zeroed counters.
    pub fn new_custom() -> Self {
        Self { policy: "-".to_string(), counters: "[0:0]".to_string() }
    }
}

/// One table's chains (ordered) and rule lines (insertion order).
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub chains: IndexMap<String, ChainHeader>,
    pub rules: Vec<String>,
}

/// The full parsed dump: one [`Table`] per present `*table` block.
#[derive(Debug, Clone, Default)]
pub struct Tables(pub IndexMap<FilterTable, Table>);

impl Tables {
    pub fn table_mut(&mut self, table: FilterTable) -> &mut Table {
        self.0.entry(table).or_default()
    }

    pub fn table(&self, table: FilterTable) -> Option<&Table> {
        self.0.get(&table)
    }
}

/// Parse a full save-format dump into [`Tables`].
pub fn parse(dump: &str) -> Result<Tables, ReconcileError> {
    let mut tables = Tables::default();
    let mut current: Option<FilterTable> = None;

    for line in dump.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('*') {
            let table = FilterTable::parse(name.trim())
                .ok_or_else(|| ReconcileError::Parse(format!("unknown table {name:?}")))?;
            current = Some(table);
            tables.table_mut(table);
            continue;
        }
        if line == "COMMIT" {
            current = None;
            continue;
        }
        let table = current.ok_or_else(|| ReconcileError::Parse(format!("rule line outside table block: {line:?}")))?;
        if let Some(rest) = line.strip_prefix(':') {
            let mut parts = rest.splitn(3, ' ');
            let chain_name = parts.next().unwrap_or_default().to_string();
            let policy = parts.next().unwrap_or("-").to_string();
            let counters = parts.next().unwrap_or("[0:0]").to_string();
            tables.table_mut(table).chains.insert(chain_name, ChainHeader { policy, counters });
        } else if line.starts_with("-A") || line.starts_with("-I") {
            tables.table_mut(table).rules.push(line.to_string());
        } else {
            return Err(ReconcileError::Parse(format!("unrecognised line: {line:?}")));
        }
    }

    Ok(tables)
}

/// Serialise [`Tables`] back to save format in the fixed table order, with
/// chains sorted by name within a table and rules in insertion order.
pub fn serialize(tables: &Tables) -> String {
    let mut out = String::new();
    for table in FilterTable::ORDER {
        let Some(t) = tables.table(table) else { continue };
        out.push('*');
        out.push_str(table.name());
        out.push('\n');

        let mut chain_names: Vec<&String> = t.chains.keys().collect();
        chain_names.sort();
        for name in chain_names {
            let header = &t.chains[name];
            out.push_str(&format!(":{} {} {}\n", name, header.policy, header.counters));
        }
        for rule in &t.rules {
            out.push_str(rule);
            out.push('\n');
        }
        out.push_str("COMMIT\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "*filter\n:INPUT ACCEPT [0:0]\n:FORWARD ACCEPT [0:0]\n-A INPUT -p tcp --dport 22 -j ACCEPT\nCOMMIT\n";

    #[test]
    fn parses_chains_and_rules() {
        let tables = parse(SAMPLE).unwrap();
        let filter = tables.table(FilterTable::Filter).unwrap();
        assert_eq!(filter.chains.len(), 2);
        assert_eq!(filter.rules, vec!["-A INPUT -p tcp --dport 22 -j ACCEPT".to_string()]);
    }

    #[test]
    fn round_trips_byte_identical_modulo_nothing_here() {
        let tables = parse(SAMPLE).unwrap();
        let out = serialize(&tables);
        assert_eq!(out, SAMPLE);
    }

    #[test]
    fn rejects_rule_line_outside_table_block() {
        let result = parse("-A INPUT -j ACCEPT\n");
        assert!(result.is_err());
    }

    #[test]
    fn table_order_is_fixed_regardless_of_input_order() {
        let dump = "*filter\nCOMMIT\n*raw\nCOMMIT\n";
        let tables = parse(dump).unwrap();
        let out = serialize(&tables);
        let raw_pos = out.find("*raw").unwrap();
        let filter_pos = out.find("*filter").unwrap();
        assert!(raw_pos < filter_pos);
    }
}
