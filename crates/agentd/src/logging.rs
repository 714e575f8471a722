// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured logging setup: env-filtered logs to stderr plus a rolling
//! file under `/var/log/nspass/agent.log`. Subscriber initialization
//! happens exactly once, here — every other crate in the workspace only
//! ever calls the `tracing` macros.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber: env-filtered logs to stderr plus a
/// daily-rolling file under `log_dir`. The returned guard must be held for
/// the process lifetime — dropping it stops the non-blocking writer's
/// background thread and any buffered lines are lost.
pub fn init(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "agent.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}
