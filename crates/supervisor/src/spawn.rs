// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process spawn helper shared by every protocol wrapper.
//!
//! Launches the binary in a new process group and detaches a reaper task
//! that awaits the child's exit so it never becomes a zombie, matching the
//! teacher's spawn-and-reap convention.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::InstanceError;

/// Spawn `program` with `args`, in a new process group, inheriting no stdin
/// and redirecting stdout/stderr to null by default.
///
/// Returns the child's pid. A background task is detached to reap the child
/// once it exits, logging a non-zero exit status at WARN.
pub(crate) fn spawn_detached(program: &Path, args: &[String]) -> Result<u32, InstanceError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());
    cmd.kill_on_drop(false);

    #[cfg(unix)]
    {
        // New process group rooted at the child itself (pgid == child pid),
        // so the agent can signal the whole group if a protocol binary ever
        // forks helpers. `process_group` is the safe, libc-free equivalent
        // of a `setsid`-calling `pre_exec` hook and keeps this crate
        // compliant with the workspace's `unsafe_code = "forbid"` lint.
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(InstanceError::Spawn)?;
    let pid = child.id().ok_or_else(|| InstanceError::Spawn(std::io::Error::other("child exited immediately")))?;

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => debug!(pid, "child exited cleanly"),
            Ok(status) => warn!(pid, ?status, "child exited with non-zero status"),
            Err(e) => warn!(pid, error = %e, "error waiting for child"),
        }
    });

    Ok(pid)
}
