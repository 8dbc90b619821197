// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event metadata sidecars.
//!
//! Each saved clip gets a matching `.json` file so the file server sees
//! self-describing artifacts without a database round-trip.

use jalopy_core::TelemetryEvent;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Write `{clip}.json` next to the clip. Returns the sidecar path.
pub fn write_sidecar(event: &TelemetryEvent, clip_path: &Path) -> std::io::Result<PathBuf> {
    let sidecar = clip_path.with_extension("json");
    let body = json!({
        "id": event.id,
        "kind": event.kind,
        "t_start": event.started_at_ms,
        "t_end": event.ended_at_ms,
        "peaks": { "ax": event.peaks.ax, "ay": event.peaks.ay, "az": event.peaks.az },
        "interrupted": event.interrupted,
        "video_path": event.video_path,
    });
    std::fs::write(&sidecar, serde_json::to_vec_pretty(&body)?)?;
    Ok(sidecar)
}

#[cfg(test)]
#[path = "sidecar_tests.rs"]
mod tests;
