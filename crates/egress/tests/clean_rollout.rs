// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! "Clean egress rollout" end-to-end scenario: pushing one shadowsocks item
//! converges to a live, supervised child process whose pid file names it,
//! and the acknowledgement reports it as applied.
//!
//! The real shadowsocks binary is stood in for by a shell script that just
//! sleeps, so the full configure/spawn/pid-file cycle runs without
//! depending on a real protocol binary being installed.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use nspass_core::{DeclaredEgressItem, EgressId, EgressOverrides, InstanceStatus, ProtocolConfig, SystemClock};
use nspass_egress::EgressReconciler;
use nspass_supervisor::{BinaryPaths, Supervisor};

fn write_fake_shadowsocks_binary(path: &std::path::Path) {
    std::fs::write(path, "#!/bin/sh\nexec sleep 300\n").unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

#[tokio::test]
async fn clean_egress_rollout_starts_instance_and_acknowledges_success() {
    let state_root = tempfile::tempdir().unwrap();
    let fake_binary = state_root.path().join("fake-shadowsocks-server");
    write_fake_shadowsocks_binary(&fake_binary);

    let supervisor = Arc::new(Supervisor::new(
        state_root.path().to_path_buf(),
        BinaryPaths {
            shadowsocks: fake_binary,
            trojan: std::path::PathBuf::from("/nonexistent/trojan"),
            snell: std::path::PathBuf::from("/nonexistent/snell"),
        },
        Arc::new(SystemClock),
    ));
    let reconciler = EgressReconciler::new(Arc::clone(&supervisor));

    let declared = vec![DeclaredEgressItem {
        egress_id: EgressId::from("e1"),
        config: ProtocolConfig::Shadowsocks2022 {
            method: "2022-blake3-aes-256-gcm".into(),
            password: "p".into(),
            port: Some(8388),
        },
        overrides: EgressOverrides::default(),
    }];

    let ack = reconciler.apply(declared).await;
    assert!(ack.results[0].success, "item should converge: {:?}", ack.results[0].error);
    assert_eq!(ack.total, 1);
    assert_eq!(ack.succeeded, 1);

    assert_eq!(supervisor.instance_status(&EgressId::from("e1")), Some(InstanceStatus::Running));

    let pid_path = state_root.path().join("proxy").join("shadowsocks-e1.pid");
    assert!(pid_path.exists(), "pid file must exist at the per-egress path");
    let pid: i32 = std::fs::read_to_string(&pid_path).unwrap().trim().parse().unwrap();

    // The recorded pid must actually reference a live process.
    let probe = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None);
    assert!(probe.is_ok(), "pid file must reference the live child process");

    // Clean up: SIGKILL the sleeping child so the test doesn't leak it.
    let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGKILL);
}
