// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor: owns the egress-id -> proxy-instance map and drives
//! declarative convergence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use nspass_core::{DeclaredEgressItem, EgressId, InstanceStatus, ProxyInstanceState, ProxyVariant, SharedClock};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{InstanceError, SupervisorError};
use crate::instance::{ProxyInstance, file_path};
use crate::snell::SnellInstance;
use crate::shadowsocks::ShadowsocksInstance;
use crate::trojan::TrojanInstance;

/// A registered instance: its tracked state plus the concrete protocol
/// implementation driving its lifecycle operations.
pub(crate) struct Registered {
    pub state: ProxyInstanceState,
    pub proxy: Arc<dyn ProxyInstance>,
}

/// Where to find each protocol's binary. Installation/download of binaries
/// is out of scope; the supervisor only ever checks whether a path already
/// exists.
#[derive(Debug, Clone)]
pub struct BinaryPaths {
    pub shadowsocks: PathBuf,
    pub trojan: PathBuf,
    pub snell: PathBuf,
}

/// Owns the declared-set -> running-process convergence for every egress id.
///
/// Lock order: supervisor -> instance -> monitor stats. This struct's own
/// lock (the instance map) is always acquired before any per-instance
/// work; it must never be re-acquired while holding a deeper lock.
pub struct Supervisor {
    state_root: PathBuf,
    binaries: BinaryPaths,
    pub(crate) instances: Mutex<HashMap<EgressId, Registered>>,
    pub(crate) clock: SharedClock,
}

impl Supervisor {
    pub fn new(state_root: PathBuf, binaries: BinaryPaths, clock: SharedClock) -> Self {
        Self { state_root, binaries, instances: Mutex::new(HashMap::new()), clock }
    }

    fn build_instance(&self, variant: ProxyVariant) -> Arc<dyn ProxyInstance> {
        match variant {
            ProxyVariant::Shadowsocks2022 => Arc::new(ShadowsocksInstance::new(self.binaries.shadowsocks.clone())),
            ProxyVariant::Trojan => Arc::new(TrojanInstance::new(self.binaries.trojan.clone())),
            ProxyVariant::Snell => Arc::new(SnellInstance::new(self.binaries.snell.clone())),
        }
    }

    fn config_path(&self, variant: ProxyVariant, egress_id: &EgressId) -> PathBuf {
        file_path(&self.state_root, "proxy", variant.file_stem(), egress_id.as_str(), "json")
    }

    fn pid_path(&self, variant: ProxyVariant, egress_id: &EgressId) -> PathBuf {
        file_path(&self.state_root, "proxy", variant.file_stem(), egress_id.as_str(), "pid")
    }

    /// Converge the running set to exactly `declared`.
    ///
    /// Returns `Ok(())` if every item converged; otherwise a
    /// [`SupervisorError::PartialFailure`] enumerating the items that
    /// failed, after still attempting every other item.
    pub async fn update_proxies(&self, declared: Vec<DeclaredEgressItem>) -> Result<(), SupervisorError> {
        let declared_ids: std::collections::HashSet<EgressId> =
            declared.iter().map(|item| item.egress_id.clone()).collect();

        let mut failures = Vec::new();
        let total = declared.len();

        for item in declared {
            if let Err(e) = self.converge_one(&item).await {
                warn!(egress_id = %item.egress_id, error = %e, "egress item failed to converge");
                failures.push((item.egress_id, e));
            }
        }

        // Stop and remove instances no longer declared.
        let stale: Vec<EgressId> = {
            let instances = self.instances.lock();
            instances.keys().filter(|id| !declared_ids.contains(*id)).cloned().collect()
        };
        for id in stale {
            self.remove_one(&id).await;
        }

        if failures.is_empty() { Ok(()) } else { Err(SupervisorError::PartialFailure { total, failures }) }
    }

    async fn converge_one(&self, item: &DeclaredEgressItem) -> Result<(), InstanceError> {
        let variant = item.variant();
        let config_path = self.config_path(variant, &item.egress_id);
        let pid_path = self.pid_path(variant, &item.egress_id);

        let blob = serde_json::to_value(item.effective_config())
            .map_err(|e| InstanceError::ConfigParse(e.to_string()))?;

        // Skip the stop/configure/start cycle when this egress id is already
        // running the same protocol variant with byte-identical declared
        // content. This is what makes repeated `update_proxies(declared)`
        // calls idempotent at the process level.
        let unchanged = {
            let instances = self.instances.lock();
            instances.get(&item.egress_id).is_some_and(|r| {
                r.state.status == InstanceStatus::Running
                    && r.state.variant == variant
                    && r.state.config_blob == blob
            })
        };
        if unchanged {
            if let Some(r) = self.instances.lock().get_mut(&item.egress_id) {
                r.state.last_check_millis = Some(self.clock.now_millis());
            }
            return Ok(());
        }

        // Step 2: if an instance with that id already exists, stop it first.
        let existing_proxy = {
            let instances = self.instances.lock();
            instances.get(&item.egress_id).map(|r| Arc::clone(&r.proxy))
        };
        if let Some(proxy) = existing_proxy {
            proxy.stop(&pid_path).await?;
        }

        let proxy = self.build_instance(variant);

        match proxy.status(&pid_path).await {
            nspass_core::ProcessStatus::NotInstalled => return Err(InstanceError::NotInstalled),
            _ => {}
        }

        proxy.configure(&blob, &config_path).await?;
        proxy.start(&config_path, &pid_path).await?;

        let mut state = ProxyInstanceState::new(item.egress_id.clone(), variant, blob, config_path, pid_path);
        state.status = InstanceStatus::Running;
        state.last_check_millis = Some(self.clock.now_millis());

        self.instances.lock().insert(item.egress_id.clone(), Registered { state, proxy });
        info!(egress_id = %item.egress_id, %variant, "egress instance converged");
        Ok(())
    }

    async fn remove_one(&self, id: &EgressId) {
        let proxy_and_pid = {
            let instances = self.instances.lock();
            instances.get(id).map(|r| (Arc::clone(&r.proxy), r.state.pid_file_path.clone()))
        };
        if let Some((proxy, pid_path)) = proxy_and_pid {
            if let Err(e) = proxy.stop(&pid_path).await {
                warn!(egress_id = %id, error = %e, "failed to stop removed egress instance");
            }
        }
        self.instances.lock().remove(id);
        info!(egress_id = %id, "egress instance removed (no longer declared)");
    }

    /// Restart every registered instance using its cached config blob, for
    /// `RESTART` tasks with `service = "proxy"`. Unlike the monitor's
    /// crash-triggered restart policy, this is unconditional — no cooldown
    /// or rate limit applies to an operator-requested restart.
    pub async fn restart_all(&self) -> Result<(), SupervisorError> {
        let ids: Vec<EgressId> = self.registered_ids();
        let total = ids.len();
        let mut failures = Vec::new();

        for id in ids {
            if let Err(e) = self.restart_one(&id).await {
                warn!(egress_id = %id, error = %e, "egress instance failed to restart");
                failures.push((id, e));
            }
        }

        if failures.is_empty() { Ok(()) } else { Err(SupervisorError::PartialFailure { total, failures }) }
    }

    async fn restart_one(&self, id: &EgressId) -> Result<(), InstanceError> {
        let (proxy, config_path, pid_path, blob) = {
            let instances = self.instances.lock();
            let Some(r) = instances.get(id) else { return Ok(()) };
            (Arc::clone(&r.proxy), r.state.config_path.clone(), r.state.pid_file_path.clone(), r.state.config_blob.clone())
        };

        proxy.stop(&pid_path).await?;
        proxy.configure(&blob, &config_path).await?;
        proxy.start(&config_path, &pid_path).await?;

        let mut instances = self.instances.lock();
        if let Some(r) = instances.get_mut(id) {
            r.state.status = InstanceStatus::Running;
            r.state.last_restart_millis = Some(self.clock.now_millis());
            r.state.restart_count += 1;
        }
        Ok(())
    }

    /// Snapshot of the currently registered egress ids, for tests and metrics.
    pub fn registered_ids(&self) -> Vec<EgressId> {
        self.instances.lock().keys().cloned().collect()
    }

    /// Whether every registered instance currently reports `running`,
    /// backing the `HEALTH_CHECK` task's `proxy` probe.
    pub fn all_running(&self) -> bool {
        self.instances.lock().values().all(|r| r.state.status == InstanceStatus::Running)
    }

    /// Snapshot of one instance's state, for tests and metrics.
    pub fn instance_status(&self, id: &EgressId) -> Option<InstanceStatus> {
        self.instances.lock().get(id).map(|r| r.state.status)
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Supervisor {
    /// Register an arbitrary [`ProxyInstance`] directly, bypassing the
    /// real-binary lookup in [`Self::build_instance`] — used by this
    /// crate's and downstream crates' tests to exercise convergence and
    /// monitor behaviour against a [`crate::test_support::FakeInstance`].
    pub fn register_for_test(&self, id: EgressId, variant: ProxyVariant, proxy: Arc<dyn ProxyInstance>) {
        let config_path = self.config_path(variant, &id);
        let pid_path = self.pid_path(variant, &id);
        let mut state = ProxyInstanceState::new(id.clone(), variant, serde_json::Value::Null, config_path, pid_path);
        state.status = InstanceStatus::Running;
        self.instances.lock().insert(id, Registered { state, proxy });
    }
}
