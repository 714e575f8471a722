// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor sweep and restart policy.

use std::sync::Arc;
use std::time::Duration;

use nspass_core::{EgressId, InstanceStatus, MonitorStats, RestartRecord};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::supervisor::Supervisor;

/// Tunables for the monitor sweep and restart policy.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub check_interval: Duration,
    pub health_timeout: Duration,
    pub restart_cooldown: Duration,
    pub max_restarts_per_hour: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            health_timeout: Duration::from_secs(10),
            restart_cooldown: Duration::from_secs(30),
            max_restarts_per_hour: 5,
        }
    }
}

const RESTART_WINDOW_MILLIS: i64 = 60 * 60 * 1000;
const POST_STOP_DELAY: Duration = Duration::from_secs(2);
const POST_START_VERIFY_DELAY: Duration = Duration::from_secs(3);

/// Owns the monitor's process-wide counters and drives periodic sweeps over
/// the supervisor's instance map.
pub struct Monitor {
    supervisor: Arc<Supervisor>,
    config: MonitorConfig,
    stats: Mutex<MonitorStats>,
    enabled: std::sync::atomic::AtomicBool,
}

impl Monitor {
    pub fn new(supervisor: Arc<Supervisor>, config: MonitorConfig) -> Self {
        Self { supervisor, config, stats: Mutex::new(MonitorStats::default()), enabled: std::sync::atomic::AtomicBool::new(true) }
    }

    pub fn stats(&self) -> MonitorStats {
        *self.stats.lock()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, std::sync::atomic::Ordering::Relaxed);
    }

    /// Run sweeps on `check_interval` until `cancel` fires.
    pub async fn run(&self, cancel: tokio_util::sync::CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sweep().await,
            }
        }
    }

    /// One sweep: probe every registered instance concurrently, update
    /// status, and trigger restart policy for newly-crashed instances.
    pub async fn sweep(&self) {
        let now_millis = self.supervisor.clock.now_millis();
        {
            let mut stats = self.stats.lock();
            stats.record_sweep(now_millis);
        }

        let ids = self.supervisor.registered_ids();
        let probes = ids.into_iter().map(|id| {
            let health_timeout = self.config.health_timeout;
            async move {
                let proxy_and_pid = {
                    let instances = self.supervisor.instances.lock();
                    instances.get(&id).map(|r| (Arc::clone(&r.proxy), r.state.pid_file_path.clone(), r.state.status))
                };
                let Some((proxy, pid_path, prev_status)) = proxy_and_pid else { return };

                let running = tokio::time::timeout(health_timeout, proxy.is_running(&pid_path))
                    .await
                    .unwrap_or(false); // timeout -> treat as not running

                let new_status = match (prev_status, running) {
                    (_, true) => InstanceStatus::Running,
                    (InstanceStatus::Running | InstanceStatus::Unknown, false) => InstanceStatus::Crashed,
                    (InstanceStatus::Stopped, false) => InstanceStatus::Stopped,
                    (other, false) => other,
                };

                {
                    let mut instances = self.supervisor.instances.lock();
                    if let Some(r) = instances.get_mut(&id) {
                        r.state.status = new_status;
                        r.state.last_check_millis = Some(self.supervisor.clock.now_millis());
                    }
                }

                if new_status == InstanceStatus::Crashed && self.enabled.load(std::sync::atomic::Ordering::Relaxed) {
                    self.try_restart(&id).await;
                }
            }
        });
        futures_util::future::join_all(probes).await;
    }

    /// Restart policy: cooldown + rolling-hour rate limit, then
    /// stop/configure/start/verify.
    async fn try_restart(&self, id: &EgressId) {
        let now_millis = self.supervisor.clock.now_millis();

        let (proxy, config_path, pid_path, blob, last_restart_millis, restarts_in_window) = {
            let instances = self.supervisor.instances.lock();
            let Some(r) = instances.get(id) else { return };
            (
                Arc::clone(&r.proxy),
                r.state.config_path.clone(),
                r.state.pid_file_path.clone(),
                r.state.config_blob.clone(),
                r.state.last_restart_millis,
                r.state.history.count_since(now_millis, RESTART_WINDOW_MILLIS),
            )
        };

        if let Some(last) = last_restart_millis {
            if now_millis.saturating_sub(last) < self.config.restart_cooldown.as_millis() as i64 {
                return;
            }
        }
        if restarts_in_window as u32 >= self.config.max_restarts_per_hour {
            warn!(egress_id = %id, "max restarts per hour reached, leaving instance crashed");
            return;
        }

        {
            let mut instances = self.supervisor.instances.lock();
            if let Some(r) = instances.get_mut(id) {
                r.state.status = InstanceStatus::Restarting;
            }
        }

        let start = self.supervisor.clock.now();
        let _ = proxy.stop(&pid_path).await;
        tokio::time::sleep(POST_STOP_DELAY).await;
        let configure_result = proxy.configure(&blob, &config_path).await;
        let start_result = if configure_result.is_ok() { proxy.start(&config_path, &pid_path).await } else { configure_result.map(|_| ()) };
        tokio::time::sleep(POST_START_VERIFY_DELAY).await;
        let verified = start_result.is_ok() && proxy.is_running(&pid_path).await;
        let duration_millis = self.supervisor.clock.now().saturating_duration_since(start).as_millis() as u64;

        let record = RestartRecord {
            at_millis: now_millis,
            reason: "crashed".to_string(),
            success: verified,
            duration_millis,
        };

        {
            let mut instances = self.supervisor.instances.lock();
            if let Some(r) = instances.get_mut(id) {
                r.state.history.push(record);
                r.state.last_restart_millis = Some(now_millis);
                r.state.restart_count += 1;
                r.state.status = if verified { InstanceStatus::Running } else { InstanceStatus::Crashed };
            }
        }

        self.stats.lock().record_restart_attempt(verified);
        if verified {
            info!(egress_id = %id, "instance restarted successfully");
        } else {
            warn!(egress_id = %id, "instance restart failed, remains crashed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::BinaryPaths;
    use crate::test_support::FakeInstance;
    use nspass_core::{EgressId, FakeClock, ProxyVariant};
    use std::path::{Path, PathBuf};
    use std::sync::Arc as StdArc;
    use tempfile::tempdir;

    fn new_supervisor() -> (StdArc<Supervisor>, StdArc<FakeClock>) {
        let dir = tempdir().unwrap();
        let clock = StdArc::new(FakeClock::new());
        let sup = StdArc::new(Supervisor::new(
            dir.path().to_path_buf(),
            BinaryPaths {
                shadowsocks: PathBuf::from("/nonexistent"),
                trojan: PathBuf::from("/nonexistent"),
                snell: PathBuf::from("/nonexistent"),
            },
            clock.clone(),
        ));
        (sup, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn crash_is_detected_and_recovered() {
        let (sup, _clock) = new_supervisor();
        let fake = StdArc::new(FakeInstance::new());
        fake.start(Path::new(""), Path::new("")).await.unwrap();
        sup.register_for_test(EgressId::from("e1"), ProxyVariant::Snell, fake.clone());

        fake.crash();
        let monitor = Monitor::new(sup.clone(), MonitorConfig { restart_cooldown: Duration::ZERO, ..Default::default() });
        monitor.sweep().await;

        assert_eq!(sup.instance_status(&EgressId::from("e1")), Some(InstanceStatus::Running));
        assert_eq!(monitor.stats().successful_restarts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn max_restarts_per_hour_stops_further_attempts() {
        let (sup, _clock) = new_supervisor();
        let fake = StdArc::new(FakeInstance::new());
        fake.set_fail_start(true);
        sup.register_for_test(EgressId::from("e1"), ProxyVariant::Snell, fake.clone());

        let monitor = Monitor::new(
            sup.clone(),
            MonitorConfig { restart_cooldown: Duration::ZERO, max_restarts_per_hour: 3, ..Default::default() },
        );

        for _ in 0..5 {
            fake.crash();
            monitor.sweep().await;
        }

        assert_eq!(monitor.stats().total_restarts, 3);
        assert_eq!(sup.instance_status(&EgressId::from("e1")), Some(InstanceStatus::Crashed));
    }
}

