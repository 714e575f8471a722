// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end reconciliation against fake `iptables-save`/`iptables-restore`
//! stand-ins, covering tag-scoped pushes and revocation.
//!
//! The fake commands are tiny shell scripts that read/write a shared file
//! standing in for the kernel's live table state, so the full dump-prune-
//! apply-restore cycle runs without a real netfilter-capable kernel.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use nspass_core::{DeclaredRule, FilterTable, RuleAction, RuleId};
use nspass_netfilter::{FilterCommands, Reconciler};

const OPERATOR_RULE: &str = "*filter\n:INPUT ACCEPT [0:0]\n-A INPUT -p tcp --dport 22 -j ACCEPT\nCOMMIT\n";

fn write_executable_script(path: &Path, body: &str) {
    std::fs::write(path, body).expect("write script");
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod script");
}

/// Sets up fake dump/restore commands sharing a "kernel state" file seeded
/// with `initial`, plus a fresh backup dir and canonical rules-file path.
fn harness(dir: &Path, initial: &str) -> (Reconciler, std::path::PathBuf) {
    let state_path = dir.join("kernel-state.save");
    std::fs::write(&state_path, initial).unwrap();

    let dump_script = dir.join("fake-iptables-save");
    write_executable_script(&dump_script, &format!("#!/bin/sh\ncat '{}'\n", state_path.display()));

    let restore_script = dir.join("fake-iptables-restore");
    write_executable_script(&restore_script, &format!("#!/bin/sh\ncp \"$1\" '{}'\n", state_path.display()));

    let backup_dir = dir.join("backups");
    let rules_file = dir.join("rules.v4");

    let reconciler = Reconciler::new(
        FilterCommands { dump: dump_script, restore: restore_script },
        backup_dir,
        rules_file.clone(),
    );
    (reconciler, state_path)
}

fn rule(id: &str, chain: &str, body: &str) -> DeclaredRule {
    DeclaredRule {
        id: RuleId::from(id),
        table: FilterTable::Filter,
        chain: chain.to_string(),
        rule: body.to_string(),
        action: RuleAction::Add,
        enabled: true,
    }
}

#[tokio::test]
async fn tag_scoped_push_then_revocation_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, state_path) = harness(dir.path(), OPERATOR_RULE);

    // Scenario 4: push one enabled rule.
    let declared = vec![rule("r1", "INPUT", "-p tcp --dport 80 -j ACCEPT")];
    reconciler.update_rules(&declared, 1_000).await.expect("first reconcile");

    let state_after_push = std::fs::read_to_string(&state_path).unwrap();
    assert!(state_after_push.contains("--dport 22"), "operator rule must survive");
    assert!(
        state_after_push.contains("--dport 80 -j ACCEPT -m comment --comment \"NSPass:r1\""),
        "declared rule must be tagged and present: {state_after_push}"
    );

    let rules_file = dir.path().join("rules.v4");
    let persisted = std::fs::read_to_string(&rules_file).unwrap();
    assert_eq!(persisted, state_after_push, "canonical file must match live kernel state");

    let backups_after_first: Vec<_> = std::fs::read_dir(dir.path().join("backups")).unwrap().collect();
    assert_eq!(backups_after_first.len(), 1);

    // Scenario 5: revoke by pushing an empty declared list.
    reconciler.update_rules(&[], 2_000).await.expect("revocation reconcile");

    let state_after_revoke = std::fs::read_to_string(&state_path).unwrap();
    assert!(state_after_revoke.contains("--dport 22"), "operator rule must still survive");
    assert!(!state_after_revoke.contains("NSPass:r1"), "tagged rule must be gone");

    let backups_after_second: Vec<_> = std::fs::read_dir(dir.path().join("backups")).unwrap().collect();
    assert_eq!(backups_after_second.len(), 2, "a new backup file must exist after the second call");
}

#[tokio::test]
async fn restore_failure_rolls_back_and_leaves_canonical_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("kernel-state.save");
    std::fs::write(&state_path, OPERATOR_RULE).unwrap();

    let dump_script = dir.path().join("fake-iptables-save");
    write_executable_script(&dump_script, &format!("#!/bin/sh\ncat '{}'\n", state_path.display()));

    // A restore command that always fails, simulating a syntax error the
    // live `iptables-restore` would reject.
    let restore_script = dir.path().join("fake-iptables-restore-failing");
    write_executable_script(&restore_script, "#!/bin/sh\nexit 1\n");

    let rules_file = dir.path().join("rules.v4");
    let reconciler = Reconciler::new(
        FilterCommands { dump: dump_script, restore: restore_script },
        dir.path().join("backups"),
        rules_file.clone(),
    );

    let declared = vec![rule("r1", "INPUT", "-p tcp --dport 80 -j ACCEPT")];
    let result = reconciler.update_rules(&declared, 1_000).await;
    assert!(result.is_err());
    assert!(!rules_file.exists(), "canonical file is only written after a successful restore");
}
