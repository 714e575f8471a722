// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable-driven startup configuration for the agent binary.
//! `config.yaml` itself — the operator-facing declarative file — is out of
//! core scope; this is only the small set of values the binary needs to
//! wire the session transport, supervisor and filter reconciler together
//! before the control plane ever pushes anything.

use std::path::PathBuf;
use std::time::Duration;

use nspass_supervisor::{BinaryPaths, MonitorConfig};
use nspass_transport::TransportConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub base_url: String,
    pub agent_id: String,
    pub token: String,
    pub state_root: PathBuf,
    pub log_dir: PathBuf,
    pub systemd_unit: String,
    pub shadowsocks_binary: PathBuf,
    pub trojan_binary: PathBuf,
    pub snell_binary: PathBuf,
    pub monitor_check_interval_secs: u64,
    pub monitor_health_timeout_secs: u64,
    pub monitor_restart_cooldown_secs: u64,
    pub monitor_max_restarts_per_hour: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            agent_id: String::new(),
            token: String::new(),
            state_root: PathBuf::from("/etc/nspass"),
            log_dir: PathBuf::from("/var/log/nspass"),
            systemd_unit: "nspass-agent".to_string(),
            shadowsocks_binary: PathBuf::from("/usr/local/bin/ss-server"),
            trojan_binary: PathBuf::from("/usr/local/bin/trojan"),
            snell_binary: PathBuf::from("/usr/local/bin/snell-server"),
            monitor_check_interval_secs: 10,
            monitor_health_timeout_secs: 10,
            monitor_restart_cooldown_secs: 30,
            monitor_max_restarts_per_hour: 5,
        }
    }
}

macro_rules! overlay_env {
    ($config:expr, $field:ident, $env_name:literal) => {
        if let Ok(value) = std::env::var($env_name) {
            $config.$field = value.into();
        }
    };
    ($config:expr, $field:ident, $env_name:literal, parse) => {
        if let Some(value) = std::env::var($env_name).ok().and_then(|v| v.parse().ok()) {
            $config.$field = value;
        }
    };
}

impl AgentConfig {
    /// Load defaults, apply an optional TOML override file named by
    /// `NSPASS_CONFIG_FILE`, then apply individual `NSPASS_*` environment
    /// variables on top, which always take precedence over the file.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("NSPASS_CONFIG_FILE") {
            Ok(path) => Self::from_file(PathBuf::from(path))?,
            Err(_) => Self::default(),
        };

        overlay_env!(config, base_url, "NSPASS_BASE_URL");
        overlay_env!(config, agent_id, "NSPASS_AGENT_ID");
        overlay_env!(config, token, "NSPASS_TOKEN");
        overlay_env!(config, state_root, "NSPASS_STATE_ROOT", parse);
        overlay_env!(config, log_dir, "NSPASS_LOG_DIR", parse);
        overlay_env!(config, systemd_unit, "NSPASS_SYSTEMD_UNIT");
        overlay_env!(config, shadowsocks_binary, "NSPASS_SHADOWSOCKS_BINARY", parse);
        overlay_env!(config, trojan_binary, "NSPASS_TROJAN_BINARY", parse);
        overlay_env!(config, snell_binary, "NSPASS_SNELL_BINARY", parse);
        overlay_env!(config, monitor_check_interval_secs, "NSPASS_MONITOR_CHECK_INTERVAL_SECS", parse);
        overlay_env!(config, monitor_health_timeout_secs, "NSPASS_MONITOR_HEALTH_TIMEOUT_SECS", parse);
        overlay_env!(config, monitor_restart_cooldown_secs, "NSPASS_MONITOR_RESTART_COOLDOWN_SECS", parse);
        overlay_env!(config, monitor_max_restarts_per_hour, "NSPASS_MONITOR_MAX_RESTARTS_PER_HOUR", parse);

        if config.base_url.is_empty() {
            return Err(ConfigError::MissingEnv("NSPASS_BASE_URL"));
        }
        if config.agent_id.is_empty() {
            return Err(ConfigError::MissingEnv("NSPASS_AGENT_ID"));
        }
        if config.token.is_empty() {
            return Err(ConfigError::MissingEnv("NSPASS_TOKEN"));
        }

        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseFile { path, source })
    }

    pub fn binary_paths(&self) -> BinaryPaths {
        BinaryPaths {
            shadowsocks: self.shadowsocks_binary.clone(),
            trojan: self.trojan_binary.clone(),
            snell: self.snell_binary.clone(),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            check_interval: Duration::from_secs(self.monitor_check_interval_secs),
            health_timeout: Duration::from_secs(self.monitor_health_timeout_secs),
            restart_cooldown: Duration::from_secs(self.monitor_restart_cooldown_secs),
            max_restarts_per_hour: self.monitor_max_restarts_per_hour,
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.base_url.clone(), self.agent_id.clone(), self.token.clone())
    }

    pub fn iptables_rules_file(&self) -> PathBuf {
        self.state_root.join("iptables/rules.v4")
    }

    pub fn ip6tables_rules_file(&self) -> PathBuf {
        self.state_root.join("iptables/rules.v6")
    }

    pub fn iptables_backup_dir(&self) -> PathBuf {
        self.state_root.join("iptables/backup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_required_vars_is_rejected() {
        std::env::remove_var("NSPASS_BASE_URL");
        std::env::remove_var("NSPASS_AGENT_ID");
        std::env::remove_var("NSPASS_TOKEN");
        assert!(matches!(AgentConfig::load(), Err(ConfigError::MissingEnv(_))));
    }

    #[test]
    #[serial]
    fn env_vars_populate_the_config() {
        std::env::set_var("NSPASS_BASE_URL", "https://control.example.com");
        std::env::set_var("NSPASS_AGENT_ID", "agent-1");
        std::env::set_var("NSPASS_TOKEN", "tok");
        std::env::remove_var("NSPASS_CONFIG_FILE");

        let config = AgentConfig::load().unwrap();
        assert_eq!(config.base_url, "https://control.example.com");
        assert_eq!(config.agent_id, "agent-1");
        assert_eq!(config.state_root, PathBuf::from("/etc/nspass"));

        std::env::remove_var("NSPASS_BASE_URL");
        std::env::remove_var("NSPASS_AGENT_ID");
        std::env::remove_var("NSPASS_TOKEN");
    }
}
