// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic, tag-scoped reconciliation of declared rules against the kernel
//! packet-filter state.

use std::path::PathBuf;
use std::process::Stdio;

use nspass_core::{DeclaredRule, RuleAction, CHAIN_PREFIX, TAG_PREFIX};
use tokio::process::Command;
use tracing::{info, warn};

use crate::dump::{self, ChainHeader, Tables};
use crate::error::ReconcileError;

/// External commands used to dump and restore the kernel filter state. A
/// production agent wires these to `iptables-save`/`iptables-restore` (and
/// their `ip6tables` counterparts, run as a second reconciler instance);
/// tests substitute fakes.
#[derive(Debug, Clone)]
pub struct FilterCommands {
    pub dump: PathBuf,
    pub restore: PathBuf,
}

/// Reconciles the kernel filter tables to exactly the agent-tagged rules in
/// `declared`, leaving every rule not carrying the agent's tag untouched.
pub struct Reconciler {
    commands: FilterCommands,
    backup_dir: PathBuf,
    rules_file: PathBuf,
}

impl Reconciler {
    pub fn new(commands: FilterCommands, backup_dir: PathBuf, rules_file: PathBuf) -> Self {
        Self { commands, backup_dir, rules_file }
    }

    /// Run the full dump-prune-apply-restore-persist reconcile cycle.
    pub async fn update_rules(&self, declared: &[DeclaredRule], now_millis: i64) -> Result<(), ReconcileError> {
        let current_text = self.dump_current().await?;
        let backup_path = self.write_backup(&current_text, now_millis).await?;

        let mut tables = dump::parse(&current_text)?;
        prune_tagged(&mut tables);
        apply_declared(&mut tables, declared);

        let new_text = dump::serialize(&tables);

        if let Err(e) = self.restore(&new_text).await {
            warn!(error = %e, "restore failed, rolling back to backup");
            self.restore(&current_text).await.map_err(|rollback_err| {
                ReconcileError::RollbackFailed(format!("original error: {e}; rollback error: {rollback_err}"))
            })?;
            return Err(e);
        }

        tokio::fs::write(&self.rules_file, &new_text).await.map_err(ReconcileError::Persist)?;
        let _ = backup_path;
        info!(rule_count = declared.len(), "filter rules reconciled");
        Ok(())
    }

    /// Whether the dump utility can currently be invoked successfully.
    pub async fn probe(&self) -> bool {
        self.dump_current().await.is_ok()
    }

    async fn dump_current(&self) -> Result<String, ReconcileError> {
        let output = Command::new(&self.commands.dump)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(ReconcileError::Dump)?;
        if !output.status.success() {
            return Err(ReconcileError::Dump(std::io::Error::other(format!(
                "dump command exited with {:?}",
                output.status.code()
            ))));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| ReconcileError::Parse(format!("dump output not valid UTF-8: {e}")))
    }

    async fn write_backup(&self, text: &str, now_millis: i64) -> Result<PathBuf, ReconcileError> {
        tokio::fs::create_dir_all(&self.backup_dir).await.map_err(ReconcileError::Backup)?;
        let path = self.backup_dir.join(format!("filter-{now_millis}.save"));
        tokio::fs::write(&path, text).await.map_err(ReconcileError::Backup)?;
        Ok(path)
    }

    async fn restore(&self, text: &str) -> Result<(), ReconcileError> {
        let mut temp = tempfile::NamedTempFile::new().map_err(ReconcileError::TempFile)?;
        use std::io::Write as _;
        temp.write_all(text.as_bytes()).map_err(ReconcileError::TempFile)?;
        temp.flush().map_err(ReconcileError::TempFile)?;

        let output = Command::new(&self.commands.restore)
            .arg(temp.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(ReconcileError::TempFile)?;

        if !output.status.success() {
            return Err(ReconcileError::RestoreFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Remove every rule whose trailing comment embeds the agent's tag, and
/// every custom chain whose name begins with the agent's chain prefix.
/// Tagged rules and agent-owned chains are dropped unconditionally; chains
/// re-declared by the current push are recreated in [`apply_declared`].
fn prune_tagged(tables: &mut Tables) {
    for table in tables.0.values_mut() {
        table.rules.retain(|rule| !rule.contains(TAG_PREFIX));
        table.chains.retain(|name, _| !name.starts_with(CHAIN_PREFIX));
    }
}

/// Add every enabled declared rule, tagging it with its rule id, creating
/// any referenced custom chain that doesn't already exist.
fn apply_declared(tables: &mut Tables, declared: &[DeclaredRule]) {
    for rule in declared {
        if !rule.enabled {
            continue;
        }
        let table = tables.table_mut(rule.table);
        table.chains.entry(rule.chain.clone()).or_insert_with(ChainHeader::new_custom);

        let flag = match rule.action {
            RuleAction::Add => "-A",
            RuleAction::Insert => "-I",
        };
        let tag = rule.id.tag();
        let line = format!("{flag} {} {} -m comment --comment \"{tag}\"", rule.chain, rule.rule);
        table.rules.push(line);
    }
}

/// Canonical tables/commands pair for the `filter`+`nat`+`mangle`+`raw`
/// family driven by one reconciler instance. A second instance is run for
/// `ip6tables`, both wired to the same [`DeclaredRule`] list filtered by
/// the caller as appropriate.
pub fn default_ipv4_commands() -> FilterCommands {
    FilterCommands { dump: PathBuf::from("iptables-save"), restore: PathBuf::from("iptables-restore") }
}

pub fn default_ipv6_commands() -> FilterCommands {
    FilterCommands { dump: PathBuf::from("ip6tables-save"), restore: PathBuf::from("ip6tables-restore") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nspass_core::{FilterTable, RuleId};

    fn rule(id: &str, table: FilterTable, chain: &str, body: &str, action: RuleAction, enabled: bool) -> DeclaredRule {
        DeclaredRule { id: RuleId::from(id), table, chain: chain.to_string(), rule: body.to_string(), action, enabled }
    }

    #[test]
    fn prune_removes_only_tagged_rules() {
        let dump = "*filter\n:INPUT ACCEPT [0:0]\n-A INPUT -p tcp --dport 22 -j ACCEPT\n-A INPUT -j ACCEPT -m comment --comment \"NSPass:r1\"\nCOMMIT\n";
        let mut tables = dump::parse(dump).unwrap();
        prune_tagged(&mut tables);
        let filter = tables.table(FilterTable::Filter).unwrap();
        assert_eq!(filter.rules.len(), 1);
        assert!(filter.rules[0].contains("--dport 22"));
    }

    #[test]
    fn apply_skips_disabled_rules_and_creates_missing_chain() {
        let mut tables = Tables::default();
        let rules = vec![
            rule("r1", FilterTable::Filter, "NSPASS_IN", "-j ACCEPT", RuleAction::Add, true),
            rule("r2", FilterTable::Filter, "NSPASS_IN", "-j DROP", RuleAction::Add, false),
        ];
        apply_declared(&mut tables, &rules);
        let filter = tables.table(FilterTable::Filter).unwrap();
        assert_eq!(filter.rules.len(), 1);
        assert!(filter.rules[0].contains("NSPass:r1"));
        assert!(filter.chains.contains_key("NSPASS_IN"));
    }

    #[test]
    fn prune_drops_stale_agent_chain_but_keeps_operator_chain() {
        let dump = "*filter\n:INPUT ACCEPT [0:0]\n:NSPASS_IN - [0:0]\n:OPERATOR_CHAIN - [0:0]\nCOMMIT\n";
        let mut tables = dump::parse(dump).unwrap();
        prune_tagged(&mut tables);
        let filter = tables.table(FilterTable::Filter).unwrap();
        assert!(!filter.chains.contains_key("NSPASS_IN"));
        assert!(filter.chains.contains_key("OPERATOR_CHAIN"));
        assert!(filter.chains.contains_key("INPUT"));
    }

    #[test]
    fn insert_action_uses_dash_i() {
        let mut tables = Tables::default();
        let rules = vec![rule("r1", FilterTable::Nat, "PREROUTING", "-j NSPASS", RuleAction::Insert, true)];
        apply_declared(&mut tables, &rules);
        let nat = tables.table(FilterTable::Nat).unwrap();
        assert!(nat.rules[0].starts_with("-I PREROUTING"));
    }
}
