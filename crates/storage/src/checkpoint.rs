// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint-with-truncate.
//!
//! Persists a compressed snapshot covering the WAL prefix, then the store
//! truncates the WAL through that sequence. Bounded journal growth comes
//! from running this periodically and at clean shutdown.

use crate::snapshot::{rotate_bak_path, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
use crate::state::TelemetryState;
use chrono::Utc;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

/// Outcome of a checkpoint write
#[derive(Debug, Clone, Copy)]
pub struct CheckpointResult {
    pub seq: u64,
    pub size_bytes: u64,
}

/// Writes snapshots atomically: serialize + compress to a temp file,
/// rotate the previous snapshot to `.bak`, rename into place.
pub struct Checkpointer {
    snapshot_path: PathBuf,
    /// zstd level; 3 is the crate default and fine for SBC-class CPUs
    level: i32,
}

impl Checkpointer {
    pub fn new(snapshot_path: PathBuf) -> Self {
        Self { snapshot_path, level: 3 }
    }

    pub fn checkpoint_sync(
        &self,
        seq: u64,
        state: &TelemetryState,
    ) -> Result<CheckpointResult, SnapshotError> {
        let snapshot = Snapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            seq,
            state: state.clone(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_vec(&snapshot)?;
        let compressed = zstd::encode_all(json.as_slice(), self.level)?;

        let tmp = self.snapshot_path.with_extension("tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&compressed)?;
            f.sync_all()?;
        }

        if self.snapshot_path.exists() {
            let bak = rotate_bak_path(&self.snapshot_path);
            let _ = fs::rename(&self.snapshot_path, bak);
        }
        fs::rename(&tmp, &self.snapshot_path)?;

        Ok(CheckpointResult { seq, size_bytes: compressed.len() as u64 })
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
