// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Re-exec of the agent process itself via the host service manager, for
//! `RESTART` tasks with `service = "agent"`.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::DispatchError;

#[async_trait]
pub trait AgentRestarter: Send + Sync {
    async fn restart_agent(&self) -> Result<(), DispatchError>;
}

/// Invokes `systemctl restart <unit>` — systemd is the host service manager
/// on the Linux targets this agent runs on.
pub struct SystemdRestarter {
    unit_name: String,
}

impl SystemdRestarter {
    pub fn new(unit_name: impl Into<String>) -> Self {
        Self { unit_name: unit_name.into() }
    }
}

#[async_trait]
impl AgentRestarter for SystemdRestarter {
    async fn restart_agent(&self) -> Result<(), DispatchError> {
        let output = Command::new("systemctl")
            .arg("restart")
            .arg(&self.unit_name)
            .output()
            .await
            .map_err(|e| DispatchError::AgentRestart(e.to_string()))?;

        if !output.status.success() {
            return Err(DispatchError::AgentRestart(format!(
                "systemctl exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct NoopRestarter {
    pub restarted: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for NoopRestarter {
    fn default() -> Self {
        Self { restarted: std::sync::atomic::AtomicBool::new(false) }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AgentRestarter for NoopRestarter {
    async fn restart_agent(&self) -> Result<(), DispatchError> {
        self.restarted.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
