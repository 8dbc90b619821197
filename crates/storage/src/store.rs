// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store contract: crash-safe persistence of readings, events, and
//! the sync cursor.
//!
//! Single writer path serialized behind one lock; readers copy rows out
//! under the same short lock. Every mutation is appended to the WAL and
//! fsynced before the call returns, so a reading or event is durable
//! before any of its side-effects (video save, uplink) are attempted.

use crate::checkpoint::Checkpointer;
use crate::record::WalRecord;
use crate::snapshot::{load_snapshot, rotate_bak_path, SnapshotError};
use crate::state::TelemetryState;
use crate::wal::{Wal, WalError};
use jalopy_core::{EventKind, Peaks, Reading, TelemetryEvent};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("storage exhausted")]
    StorageFull,
    #[error("cursor regression: cursor={cursor} requested={requested}")]
    CursorRegression { cursor: u64, requested: u64 },
    #[error("unknown event id {0}")]
    UnknownEvent(u64),
}

impl From<WalError> for StoreError {
    fn from(e: WalError) -> Self {
        match &e {
            WalError::Io(io) if io.kind() == std::io::ErrorKind::StorageFull => {
                StoreError::StorageFull
            }
            _ => StoreError::Wal(e),
        }
    }
}

/// On-disk locations for one store
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub wal: PathBuf,
    pub snapshot: PathBuf,
}

impl StorePaths {
    pub fn under(dir: &Path) -> Self {
        Self { wal: dir.join("store.wal"), snapshot: dir.join("snapshot.zst") }
    }
}

/// What boot recovery found and did
#[derive(Debug, Clone, Default)]
pub struct BootReport {
    /// Hot WAL entries past the snapshot seq were present
    pub unclean_shutdown: bool,
    /// The snapshot was unreadable and rotated aside; state started fresh
    pub quarantined: bool,
    /// WAL entries replayed on top of the snapshot
    pub replayed: usize,
    /// Events closed with `interrupted = true`
    pub orphans_closed: Vec<u64>,
    /// (from, to) when the cursor exceeded the max reading id
    pub cursor_clamped: Option<(u64, u64)>,
}

struct Inner {
    wal: Wal,
    state: TelemetryState,
    checkpointer: Checkpointer,
    boot: BootReport,
    reconciled: bool,
}

/// Shared handle to the durable store
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
}

impl Store {
    /// Open the store: load the snapshot, open the WAL, replay the tail.
    ///
    /// An unreadable snapshot is quarantined (rotated to `.bak`) and the
    /// state starts fresh; old data stays on disk for offline recovery.
    /// Call [`Store::reconcile_on_boot`] before handing the store to
    /// writers.
    pub fn open(paths: &StorePaths) -> Result<Self, StoreError> {
        let mut boot = BootReport::default();

        let (mut state, snapshot_seq) = match load_snapshot(&paths.snapshot) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    seq = snapshot.seq,
                    readings = snapshot.state.readings.len(),
                    events = snapshot.state.events.len(),
                    "loaded snapshot"
                );
                (snapshot.state, snapshot.seq)
            }
            Ok(None) => {
                tracing::info!("no snapshot found, starting with empty state");
                (TelemetryState::default(), 0)
            }
            Err(e) => {
                let bak = rotate_bak_path(&paths.snapshot);
                let _ = std::fs::rename(&paths.snapshot, &bak);
                tracing::error!(
                    error = %e,
                    bak = %bak.display(),
                    "store_quarantined: snapshot unreadable, starting fresh"
                );
                boot.quarantined = true;
                (TelemetryState::default(), 0)
            }
        };

        // A quarantined snapshot invalidates WAL seq numbering too: the
        // tail may reference rows the lost snapshot contained. Quarantine
        // the WAL alongside and start clean.
        if boot.quarantined && paths.wal.exists() {
            let bak = rotate_bak_path(&paths.wal);
            let _ = std::fs::rename(&paths.wal, &bak);
        }

        let wal = Wal::open(&paths.wal, snapshot_seq)?;
        let entries = wal.entries_after(snapshot_seq)?;
        boot.unclean_shutdown = !entries.is_empty();
        boot.replayed = entries.len();
        for entry in &entries {
            state.apply(&entry.record);
        }

        if boot.replayed > 0 {
            tracing::info!(
                replayed = boot.replayed,
                after_seq = snapshot_seq,
                "unclean shutdown detected, replayed WAL tail"
            );
        }
        if !boot.quarantined {
            tracing::info!("store integrity check ok");
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                wal,
                state,
                checkpointer: Checkpointer::new(paths.snapshot.clone()),
                boot,
                reconciled: false,
            })),
        })
    }

    /// Close out whatever a crash left behind, then checkpoint so the
    /// repairs are durable and the WAL tail is bounded.
    ///
    /// 1. Events with a null end are closed with `interrupted = true`;
    ///    end = mtime of the attached artifact when present, else
    ///    start + 1 ms.
    /// 2. The cursor is clamped to the max reading id.
    pub fn reconcile_on_boot(&self) -> Result<BootReport, StoreError> {
        let mut inner = self.inner.lock();
        if inner.reconciled {
            return Ok(inner.boot.clone());
        }

        for id in inner.state.open_event_ids() {
            let ended_at_ms = inner
                .state
                .events
                .get(&id)
                .map(|ev| {
                    ev.video_path
                        .as_deref()
                        .and_then(file_mtime_ms)
                        .unwrap_or(ev.started_at_ms + 1)
                })
                .unwrap_or_default();

            let record =
                WalRecord::EventClosed { id, ended_at_ms, peaks: None, interrupted: true };
            inner.wal.append(&record)?;
            inner.state.apply(&record);
            inner.boot.orphans_closed.push(id);
            tracing::warn!(event_id = id, ended_at_ms, "closed interrupted event from prior run");
        }

        let max_id = inner.state.max_reading_id;
        if inner.state.cursor > max_id {
            let from = inner.state.cursor;
            inner.state.cursor = max_id;
            inner.boot.cursor_clamped = Some((from, max_id));
            tracing::warn!(from, to = max_id, "sync cursor exceeded max reading id, clamped");
        }

        inner.wal.flush()?;
        checkpoint_locked(&mut inner)?;
        inner.reconciled = true;
        Ok(inner.boot.clone())
    }

    /// Append a reading. The returned id is monotonic. Fails only on
    /// storage exhaustion (surfaced as [`StoreError::StorageFull`]).
    pub fn insert_reading(&self, reading: Reading) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let id = inner.state.max_reading_id + 1;
        let record = WalRecord::ReadingInserted { id, reading };
        commit(&mut inner, &record)?;
        Ok(id)
    }

    /// Create an open event row. If an event of this kind is already
    /// open, its id is returned instead: the events table never holds
    /// two open events of the same kind.
    pub fn open_event(
        &self,
        kind: EventKind,
        started_at_ms: u64,
        peaks: Peaks,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.state.open_event_of_kind(kind) {
            let id = existing.id;
            tracing::debug!(event_id = id, %kind, "open event of kind already exists");
            return Ok(id);
        }
        let id = inner.state.max_event_id + 1;
        let record = WalRecord::EventOpened { id, kind, started_at_ms, peaks };
        commit(&mut inner, &record)?;
        Ok(id)
    }

    /// Set the end timestamp (and final peaks). Idempotent; a later call
    /// with a later end extends the event.
    pub fn close_event(
        &self,
        id: u64,
        ended_at_ms: u64,
        peaks: Option<Peaks>,
        interrupted: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.events.contains_key(&id) {
            return Err(StoreError::UnknownEvent(id));
        }
        let record = WalRecord::EventClosed { id, ended_at_ms, peaks, interrupted };
        commit(&mut inner, &record)
    }

    /// Attach a saved clip path to an event
    pub fn attach_video(&self, id: u64, path: &Path) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.events.contains_key(&id) {
            return Err(StoreError::UnknownEvent(id));
        }
        let record = WalRecord::VideoAttached { id, path: path.to_path_buf() };
        commit(&mut inner, &record)
    }

    /// Readings with id > `after_id`, ascending, at most `limit` rows
    pub fn read_batch(&self, after_id: u64, limit: usize) -> Vec<(u64, Reading)> {
        let inner = self.inner.lock();
        inner
            .state
            .readings
            .range(after_id + 1..)
            .take(limit)
            .map(|(id, r)| (*id, r.clone()))
            .collect()
    }

    /// Persist the cursor. Rejects regression; equal is a no-op.
    pub fn advance_cursor(&self, last_id: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let cursor = inner.state.cursor;
        if last_id < cursor {
            return Err(StoreError::CursorRegression { cursor, requested: last_id });
        }
        if last_id == cursor {
            return Ok(());
        }
        let record = WalRecord::CursorAdvanced { last_id };
        commit(&mut inner, &record)
    }

    /// Snapshot the state, prune acknowledged readings, truncate the WAL
    pub fn checkpoint(&self) -> Result<crate::CheckpointResult, StoreError> {
        let mut inner = self.inner.lock();
        checkpoint_locked(&mut inner)
    }

    /// Current WAL size, for size-triggered checkpoints
    pub fn wal_bytes(&self) -> u64 {
        self.inner.lock().wal.size_bytes()
    }

    pub fn cursor(&self) -> u64 {
        self.inner.lock().state.cursor
    }

    pub fn max_reading_id(&self) -> u64 {
        self.inner.lock().state.max_reading_id
    }

    pub fn event(&self, id: u64) -> Option<TelemetryEvent> {
        self.inner.lock().state.events.get(&id).cloned()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.inner.lock().state.events.values().cloned().collect()
    }

    /// Rows currently held (pruned rows excluded)
    pub fn reading_count(&self) -> usize {
        self.inner.lock().state.readings.len()
    }
}

fn commit(inner: &mut Inner, record: &WalRecord) -> Result<(), StoreError> {
    inner.wal.append(record)?;
    inner.wal.flush()?;
    inner.state.apply(record);
    Ok(())
}

fn checkpoint_locked(inner: &mut Inner) -> Result<crate::CheckpointResult, StoreError> {
    let pruned = inner.state.prune_acknowledged();
    let seq = inner.wal.write_seq();
    let result = inner.checkpointer.checkpoint_sync(seq, &inner.state)?;
    inner.wal.truncate_before(seq + 1)?;
    tracing::debug!(seq, pruned, size_bytes = result.size_bytes, "checkpoint complete");
    Ok(result)
}

fn file_mtime_ms(path: &Path) -> Option<u64> {
    path.metadata()
        .ok()?
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
