// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote filesystem push.
//!
//! One-way reconciliation of saved clips and sidecars to the file
//! server. Source files are never deleted here; retention on the device
//! is a separate concern.

use crate::subprocess::{run_with_timeout, SubprocessError, SYNC_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum FileSyncError {
    #[error("{0}")]
    Subprocess(#[from] SubprocessError),
    #[error("file sync exited with status {status}: {stderr}")]
    Status { status: i32, stderr: String },
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStats {
    /// Files the remote did not have before this pass
    pub transferred: usize,
}

#[async_trait]
pub trait FileSync: Clone + Send + Sync + 'static {
    /// Push `local_dir` to the remote. Never deletes from source.
    async fn sync_dir(&self, local_dir: &Path) -> Result<SyncStats, FileSyncError>;
}

/// rsync over ssh. `-az` without `--delete`: additive on both ends.
#[derive(Clone, Debug)]
pub struct RsyncFileSync {
    remote_spec: String,
    ssh_command: String,
}

impl RsyncFileSync {
    pub fn new(remote_spec: String, ssh_command: String) -> Self {
        Self { remote_spec, ssh_command }
    }
}

#[async_trait]
impl FileSync for RsyncFileSync {
    async fn sync_dir(&self, local_dir: &Path) -> Result<SyncStats, FileSyncError> {
        if self.remote_spec.is_empty() {
            tracing::debug!("file sink not configured, skipping sync");
            return Ok(SyncStats::default());
        }
        let mut cmd = Command::new("rsync");
        // Trailing slash: sync contents, not the directory node
        let src = format!("{}/", local_dir.display());
        cmd.args(["-az", "--itemize-changes", "-e", &self.ssh_command])
            .arg(&src)
            .arg(&self.remote_spec);

        let output = run_with_timeout(cmd, SYNC_TIMEOUT, "file sync").await?;
        if !output.status.success() {
            return Err(FileSyncError::Status {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Itemized lines starting with '<' are uploads
        let transferred = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| l.starts_with('<'))
            .count();
        Ok(SyncStats { transferred })
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{FileSync, FileSyncError, SyncStats};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeFileSyncState {
        synced: Vec<PathBuf>,
        fail: bool,
    }

    /// Fake file sync recording requested directories
    #[derive(Clone, Default)]
    pub struct FakeFileSync {
        inner: Arc<Mutex<FakeFileSyncState>>,
    }

    impl FakeFileSync {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, fail: bool) {
            self.inner.lock().fail = fail;
        }

        pub fn synced(&self) -> Vec<PathBuf> {
            self.inner.lock().synced.clone()
        }
    }

    #[async_trait]
    impl FileSync for FakeFileSync {
        async fn sync_dir(&self, local_dir: &Path) -> Result<SyncStats, FileSyncError> {
            let mut state = self.inner.lock();
            if state.fail {
                return Err(FileSyncError::Status { status: 255, stderr: "fake".into() });
            }
            state.synced.push(local_dir.to_path_buf());
            Ok(SyncStats { transferred: 1 })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeFileSync;
