// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-instance lifecycle contract every protocol wrapper implements.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use nspass_core::ProcessStatus;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::InstanceError;

/// How long `stop()` waits for graceful exit before escalating to SIGKILL.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// One supervised child process wrapping a single protocol binary.
///
/// Three concrete implementors exist, one per protocol variant
/// (`ShadowsocksInstance`, `TrojanInstance`, `SnellInstance`), differing only
/// in binary path, config-file format, and command-line invocation.
#[async_trait]
pub trait ProxyInstance: Send + Sync {
    /// Write the protocol-specific config file atomically at `config_path`,
    /// owner-only permissions, stopping the instance first if it is running.
    async fn configure(&self, blob: &serde_json::Value, config_path: &Path) -> Result<(), InstanceError>;

    /// Launch the binary. Refuses if not installed or already running.
    /// Places the child in a new process group and writes its pid to
    /// `pid_file_path`.
    async fn start(&self, config_path: &Path, pid_file_path: &Path) -> Result<(), InstanceError>;

    /// Idempotent stop: succeeds immediately if the pid file is absent.
    /// Sends SIGTERM, escalates to SIGKILL after [`STOP_GRACE_PERIOD`], and
    /// removes the pid file.
    async fn stop(&self, pid_file_path: &Path) -> Result<(), InstanceError>;

    /// `{not_installed, running, stopped}`.
    async fn status(&self, pid_file_path: &Path) -> ProcessStatus;

    /// Signal-0 liveness probe against the pid recorded in the pid file.
    async fn is_running(&self, pid_file_path: &Path) -> bool;
}

/// Shared helpers used by every concrete [`ProxyInstance`] implementation —
/// pid-file read/write and the signal-0 liveness check are identical across
/// protocol variants; only the binary invocation differs.
pub(crate) async fn write_pid_file(path: &Path, pid: u32) -> Result<(), InstanceError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(InstanceError::PidFile)?;
    }
    let mut file = tokio::fs::File::create(path).await.map_err(InstanceError::PidFile)?;
    file.write_all(pid.to_string().as_bytes()).await.map_err(InstanceError::PidFile)?;
    Ok(())
}

pub(crate) async fn read_pid_file(path: &Path) -> Option<i32> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    contents.trim().parse::<i32>().ok()
}

pub(crate) async fn signal_zero(pid: i32) -> bool {
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// Shared stop sequence: read pid file, SIGTERM, wait up to grace period
/// polling for exit, SIGKILL, remove pid file.
pub(crate) async fn stop_via_pid_file(pid_file_path: &Path) -> Result<(), InstanceError> {
    let pid = match read_pid_file(pid_file_path).await {
        Some(pid) => pid,
        None => return Ok(()), // absent pid file: idempotent success
    };

    if signal::kill(Pid::from_raw(pid), Signal::SIGTERM).is_err() {
        // process already gone; clean up and succeed idempotently
        let _ = tokio::fs::remove_file(pid_file_path).await;
        return Ok(());
    }

    let deadline = tokio::time::Instant::now() + STOP_GRACE_PERIOD;
    loop {
        if !signal_zero(pid).await {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(pid, "process did not exit within grace period, sending SIGKILL");
            let _ = signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let _ = tokio::fs::remove_file(pid_file_path).await;
    info!(pid, "instance stopped");
    Ok(())
}

pub(crate) async fn is_running_via_pid_file(pid_file_path: &Path) -> bool {
    match read_pid_file(pid_file_path).await {
        Some(pid) => signal_zero(pid).await,
        None => false,
    }
}

pub(crate) async fn status_via_pid_file(pid_file_path: &Path, binary_installed: bool) -> ProcessStatus {
    if !binary_installed {
        return ProcessStatus::NotInstalled;
    }
    if is_running_via_pid_file(pid_file_path).await {
        ProcessStatus::Running
    } else {
        ProcessStatus::Stopped
    }
}

pub(crate) fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// pid/config file path helper, embedding the egress id.
pub fn file_path(root: &Path, sub_dir: &str, variant_stem: &str, egress_id: &str, ext: &str) -> PathBuf {
    root.join(sub_dir).join(format!("{variant_stem}-{egress_id}.{ext}"))
}
