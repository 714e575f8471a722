// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trojan instance wrapper: config path passed as a `-c` flag.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nspass_core::ProcessStatus;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::InstanceError;
use crate::instance::{
    ProxyInstance, is_running_via_pid_file, set_owner_only_permissions, status_via_pid_file,
    stop_via_pid_file, write_pid_file,
};
use crate::spawn::spawn_detached;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrojanConfig {
    password: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    sni: Option<String>,
}

fn default_port() -> u16 {
    443
}

pub struct TrojanInstance {
    pub binary_path: PathBuf,
}

impl TrojanInstance {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    fn installed(&self) -> bool {
        self.binary_path.is_file()
    }
}

#[async_trait]
impl ProxyInstance for TrojanInstance {
    async fn configure(&self, blob: &serde_json::Value, config_path: &Path) -> Result<(), InstanceError> {
        let cfg: TrojanConfig =
            serde_json::from_value(blob.clone()).map_err(|e| InstanceError::ConfigParse(e.to_string()))?;
        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(InstanceError::ConfigWrite)?;
        }
        let body = serde_json::to_vec_pretty(&cfg).map_err(|e| InstanceError::ConfigParse(e.to_string()))?;
        let mut file = tokio::fs::File::create(config_path).await.map_err(InstanceError::ConfigWrite)?;
        file.write_all(&body).await.map_err(InstanceError::ConfigWrite)?;
        set_owner_only_permissions(config_path).map_err(InstanceError::ConfigWrite)?;
        Ok(())
    }

    async fn start(&self, config_path: &Path, pid_file_path: &Path) -> Result<(), InstanceError> {
        if !self.installed() {
            return Err(InstanceError::NotInstalled);
        }
        if is_running_via_pid_file(pid_file_path).await {
            return Err(InstanceError::AlreadyRunning);
        }
        let args = vec!["-c".to_string(), config_path.display().to_string()];
        let pid = spawn_detached(&self.binary_path, &args)?;
        write_pid_file(pid_file_path, pid).await?;
        info!(pid, "trojan instance: stopped -> running");
        Ok(())
    }

    async fn stop(&self, pid_file_path: &Path) -> Result<(), InstanceError> {
        stop_via_pid_file(pid_file_path).await
    }

    async fn status(&self, pid_file_path: &Path) -> ProcessStatus {
        status_via_pid_file(pid_file_path, self.installed()).await
    }

    async fn is_running(&self, pid_file_path: &Path) -> bool {
        is_running_via_pid_file(pid_file_path).await
    }
}
