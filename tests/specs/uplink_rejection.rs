// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Too-old rejection: the sink refuses the stale head of a batch; the
//! uplink drops those rows, delivers the rest, and the cursor covers
//! the whole batch.

use jalopy_adapters::{FakeFileSync, FakeSink, PushOutcome};
use jalopy_core::{Reading, SensorClass};
use jalopy_storage::{Store, StorePaths};
use jalopy_uplink::{Probe, Uplink, UplinkConfig};
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test(start_paused = true)]
async fn stale_head_dropped_rest_delivered_cursor_covers_batch() {
    let dir = tempdir().unwrap();
    let store = Store::open(&StorePaths::under(dir.path())).unwrap();
    store.reconcile_on_boot().unwrap();

    // 500 readings, one second apart
    let base_ms = 1_700_000_000_000u64;
    for i in 0..500u64 {
        store
            .insert_reading(
                Reading::new(SensorClass::Power, base_ms + i * 1_000).with_value("volts", 12.4),
            )
            .unwrap();
    }

    let sink = FakeSink::new();
    // First push rejected: everything before reading 101 is out of window
    sink.script(PushOutcome::TooOld { cutoff_ms: Some(base_ms + 100 * 1_000) });

    let output_dir = dir.path().join("clips");
    std::fs::create_dir_all(&output_dir).unwrap();
    let uplink = Uplink::new(
        store.clone(),
        sink.clone(),
        FakeFileSync::new(),
        Probe::new("127.0.0.1".into(), 9, Duration::from_millis(100), Duration::from_secs(60)),
        UplinkConfig { output_dir, ..UplinkConfig::default() },
    );

    uplink.run_cycle().await;

    // Cursor advanced by the full 500, 100 counted as dropped, and the
    // retry loop terminated after a single re-push.
    assert_eq!(store.cursor(), 500);
    assert_eq!(uplink.stats().too_old_dropped, 100);
    assert_eq!(sink.pushes(), 2);

    let accepted = sink.accepted();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].1, 400, "only in-window samples delivered");

    // Nothing left to send
    uplink.run_cycle().await;
    assert_eq!(sink.pushes(), 2);
}
