// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controlled reboot request.
//!
//! Only the supervisor holds this adapter, and only the sampler's
//! exhausted bus-recovery path (plus the hardware watchdog, outside this
//! process) may trigger it.

use crate::subprocess::{run_with_timeout, UTILITY_TIMEOUT};
use async_trait::async_trait;
use tokio::process::Command;

#[async_trait]
pub trait RebootAdapter: Clone + Send + Sync + 'static {
    /// Request a reboot. Best-effort: the daemon keeps running until the
    /// system takes it down.
    async fn request_reboot(&self, reason: &str);
}

/// Invokes the configured reboot command (default `systemctl reboot`)
#[derive(Clone, Debug)]
pub struct CommandReboot {
    command: Vec<String>,
}

impl CommandReboot {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Default for CommandReboot {
    fn default() -> Self {
        Self { command: vec!["systemctl".into(), "reboot".into()] }
    }
}

#[async_trait]
impl RebootAdapter for CommandReboot {
    async fn request_reboot(&self, reason: &str) {
        tracing::error!(reason, command = ?self.command, "requesting system reboot");
        let Some((program, args)) = self.command.split_first() else {
            return;
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Err(e) = run_with_timeout(cmd, UTILITY_TIMEOUT, "reboot request").await {
            tracing::error!(error = %e, "reboot request failed");
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::RebootAdapter;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake reboot adapter recording requests
    #[derive(Clone, Default)]
    pub struct FakeReboot {
        reasons: Arc<Mutex<Vec<String>>>,
    }

    impl FakeReboot {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn requests(&self) -> Vec<String> {
            self.reasons.lock().clone()
        }

        pub fn requested(&self) -> bool {
            !self.reasons.lock().is_empty()
        }
    }

    #[async_trait]
    impl RebootAdapter for FakeReboot {
        async fn request_reboot(&self, reason: &str) {
            self.reasons.lock().push(reason.to_string());
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeReboot;
