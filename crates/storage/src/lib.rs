// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Crash-safe storage for readings, events, and the sync cursor.
//!
//! Layout on disk: a seq-numbered JSON-lines WAL plus a zstd-compressed
//! snapshot of the materialized state. Every store mutation is appended
//! to the WAL and fsynced before the call returns; boot loads the
//! snapshot and replays the WAL tail.

mod checkpoint;
mod record;
mod snapshot;
mod state;
mod store;
mod wal;

pub use checkpoint::{CheckpointResult, Checkpointer};
pub use record::WalRecord;
pub use snapshot::{load_snapshot, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::TelemetryState;
pub use store::{BootReport, Store, StoreError, StorePaths};
pub use wal::{Wal, WalEntry, WalError};
