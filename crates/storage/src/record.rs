// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL record types.
//!
//! Records are facts about what happened; the materialized state is
//! derived from them. Ids are assigned by the store before the record
//! is appended, so replay reproduces them exactly.

use jalopy_core::{EventKind, Peaks, Reading};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum WalRecord {
    ReadingInserted {
        id: u64,
        reading: Reading,
    },
    EventOpened {
        id: u64,
        kind: EventKind,
        started_at_ms: u64,
        peaks: Peaks,
    },
    EventClosed {
        id: u64,
        ended_at_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        peaks: Option<Peaks>,
        #[serde(default)]
        interrupted: bool,
    },
    VideoAttached {
        id: u64,
        path: PathBuf,
    },
    CursorAdvanced {
        last_id: u64,
    },
}
