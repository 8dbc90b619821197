// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.
//!
//! All record handlers must be idempotent: the same record may be applied
//! once at write time and again during replay after a crash that landed
//! between the WAL fsync and the snapshot. Assignment over mutation,
//! existence-guarded inserts.

use crate::record::WalRecord;
use jalopy_core::{Peaks, Reading, TelemetryEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Materialized store contents built from WAL records
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TelemetryState {
    /// Readings by id, ascending
    pub readings: BTreeMap<u64, Reading>,
    /// Events by id, ascending
    pub events: BTreeMap<u64, TelemetryEvent>,
    /// Largest reading id acknowledged by the remote sink
    pub cursor: u64,
    /// Highest ids ever assigned (survive pruning of the rows themselves)
    pub max_reading_id: u64,
    pub max_event_id: u64,
}

impl TelemetryState {
    pub fn apply(&mut self, record: &WalRecord) {
        match record {
            WalRecord::ReadingInserted { id, reading } => {
                self.readings.entry(*id).or_insert_with(|| reading.clone());
                self.max_reading_id = self.max_reading_id.max(*id);
            }
            WalRecord::EventOpened { id, kind, started_at_ms, peaks } => {
                self.events.entry(*id).or_insert_with(|| TelemetryEvent {
                    id: *id,
                    kind: *kind,
                    started_at_ms: *started_at_ms,
                    ended_at_ms: None,
                    peaks: *peaks,
                    interrupted: false,
                    video_path: None,
                });
                self.max_event_id = self.max_event_id.max(*id);
            }
            WalRecord::EventClosed { id, ended_at_ms, peaks, interrupted } => {
                if let Some(ev) = self.events.get_mut(id) {
                    ev.ended_at_ms = Some(*ended_at_ms);
                    ev.interrupted = *interrupted;
                    if let Some(p) = peaks {
                        ev.peaks = *p;
                    }
                }
            }
            WalRecord::VideoAttached { id, path } => {
                if let Some(ev) = self.events.get_mut(id) {
                    ev.video_path = Some(path.clone());
                }
            }
            WalRecord::CursorAdvanced { last_id } => {
                self.cursor = self.cursor.max(*last_id);
            }
        }
    }

    /// Ids of events still missing an end timestamp
    pub fn open_event_ids(&self) -> Vec<u64> {
        self.events.values().filter(|e| e.is_open()).map(|e| e.id).collect()
    }

    /// The open event of a given kind, if any
    pub fn open_event_of_kind(&self, kind: jalopy_core::EventKind) -> Option<&TelemetryEvent> {
        self.events.values().find(|e| e.kind == kind && e.is_open())
    }

    /// Drop readings already acknowledged by the cursor. Unacknowledged
    /// readings are never pruned.
    pub fn prune_acknowledged(&mut self) -> usize {
        let cursor = self.cursor;
        let before = self.readings.len();
        self.readings.retain(|id, _| *id > cursor);
        before - self.readings.len()
    }

    /// Merge per-axis peaks, keeping the larger magnitude of each
    pub fn merged_peaks(existing: Peaks, update: Peaks) -> Peaks {
        let mut merged = existing;
        merged.absorb(update.ax, update.ay, update.az);
        merged
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
