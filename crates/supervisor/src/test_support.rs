// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only [`ProxyInstance`] fake used by this crate's and downstream
//! crates' tests (e.g. `nspass-egress`), gated behind `test-support`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use nspass_core::ProcessStatus;

use crate::error::InstanceError;
use crate::instance::ProxyInstance;

/// A [`ProxyInstance`] whose behaviour is controlled entirely by in-memory
/// flags instead of a real child process — no binary, no pid file I/O.
pub struct FakeInstance {
    installed: AtomicBool,
    running: AtomicBool,
    fail_start: AtomicBool,
}

impl FakeInstance {
    pub fn new() -> Self {
        Self {
            installed: AtomicBool::new(true),
            running: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
        }
    }

    pub fn not_installed() -> Self {
        let me = Self::new();
        me.installed.store(false, Ordering::SeqCst);
        me
    }

    pub fn crash(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn is_alive_flag(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for FakeInstance {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProxyInstance for FakeInstance {
    async fn configure(&self, _blob: &serde_json::Value, _config_path: &Path) -> Result<(), InstanceError> {
        Ok(())
    }

    async fn start(&self, _config_path: &Path, _pid_file_path: &Path) -> Result<(), InstanceError> {
        if !self.installed.load(Ordering::SeqCst) {
            return Err(InstanceError::NotInstalled);
        }
        if self.fail_start.load(Ordering::SeqCst) {
            self.running.store(false, Ordering::SeqCst);
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _pid_file_path: &Path) -> Result<(), InstanceError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self, _pid_file_path: &Path) -> ProcessStatus {
        if !self.installed.load(Ordering::SeqCst) {
            ProcessStatus::NotInstalled
        } else if self.running.load(Ordering::SeqCst) {
            ProcessStatus::Running
        } else {
            ProcessStatus::Stopped
        }
    }

    async fn is_running(&self, _pid_file_path: &Path) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
