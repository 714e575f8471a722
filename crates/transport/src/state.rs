// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session state: the connected flag every loop consults before acting.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct SessionState {
    connected: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}
