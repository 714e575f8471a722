// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `nspass-agentd`: process wiring, startup configuration, logging setup
//! and the main loop for the node agent.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod logging;

use std::sync::Arc;

use config::AgentConfig;
use nspass_core::{SharedClock, SystemClock};
use nspass_egress::EgressReconciler;
use nspass_metrics::{MetricsCollector, TaskStatusSource};
use nspass_netfilter::{default_ipv4_commands, default_ipv6_commands, Reconciler};
use nspass_supervisor::{Monitor, Supervisor};
use nspass_tasks::{AgentRestarter, DeferredSink, DispatcherDeps, EnvelopeSink, SystemdRestarter, TaskDispatcher, TaskRegistry};
use nspass_transport::{CollectorMetricsSource, EgressConfigHandler, FilterConfigHandler, FilterReconcilers, MetricsSource, Session, TaskHandler};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match AgentConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("nspass-agentd: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("nspass-agentd: failed to create log directory {:?}: {e}", config.log_dir);
        std::process::exit(1);
    }
    let _log_guard = logging::init(&config.log_dir);

    info!(agent_id = %config.agent_id, base_url = %config.base_url, "starting nspass-agentd");

    let clock: SharedClock = Arc::new(SystemClock);

    let supervisor = Arc::new(Supervisor::new(config.state_root.clone(), config.binary_paths(), clock.clone()));
    let monitor = Arc::new(Monitor::new(supervisor.clone(), config.monitor_config()));
    let egress_reconciler = Arc::new(EgressReconciler::new(supervisor.clone()));

    let filter_reconcilers: Vec<Arc<Reconciler>> = vec![
        Arc::new(Reconciler::new(default_ipv4_commands(), config.iptables_backup_dir(), config.iptables_rules_file())),
        Arc::new(Reconciler::new(default_ipv6_commands(), config.iptables_backup_dir(), config.ip6tables_rules_file())),
    ];

    let metrics_collector = Arc::new(MetricsCollector::new());
    let registry = Arc::new(TaskRegistry::new());
    let agent_restarter: Arc<dyn AgentRestarter> = Arc::new(SystemdRestarter::new(config.systemd_unit.clone()));
    let deferred_sink = Arc::new(DeferredSink::new());

    let dispatcher_deps = DispatcherDeps {
        egress: egress_reconciler.clone(),
        filter_reconcilers: filter_reconcilers.clone(),
        supervisor: supervisor.clone(),
        metrics: metrics_collector.clone(),
        agent_restarter,
        outbound: deferred_sink.clone() as Arc<dyn EnvelopeSink>,
    };
    let dispatcher = Arc::new(TaskDispatcher::new(registry.clone(), dispatcher_deps));

    let task_handler: Arc<dyn TaskHandler> = dispatcher.clone();
    let egress_handler: Arc<dyn EgressConfigHandler> = egress_reconciler.clone();
    let filter_handler: Arc<dyn FilterConfigHandler> = Arc::new(FilterReconcilers(filter_reconcilers.clone()));
    let task_status: Arc<dyn TaskStatusSource> = registry.clone();
    let metrics_source: Arc<dyn MetricsSource> = Arc::new(CollectorMetricsSource::new(metrics_collector.clone(), task_status));

    let session = Session::new(config.transport_config(), task_handler, egress_handler, filter_handler, metrics_source, clock);
    deferred_sink.bind(Arc::new(session.clone()) as Arc<dyn EnvelopeSink>);

    session.start();

    let monitor_cancel = CancellationToken::new();
    let monitor_handle = tokio::spawn({
        let monitor = monitor.clone();
        let cancel = monitor_cancel.clone();
        async move { monitor.run(cancel).await }
    });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining");

    monitor_cancel.cancel();
    let _ = monitor_handle.await;
    session.stop().await;

    info!("nspass-agentd stopped");
}

/// Waits for either SIGTERM (the signal systemd sends on `systemctl stop`)
/// or SIGINT (interactive Ctrl-C during development).
async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler, falling back to SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "error waiting for ctrl-c");
            }
        }
    }
}
