// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Save verification failure: a zero-byte stitch is reported, alerted,
//! and never attached to the event row.

use jalopy_adapters::FakePipeline;
use jalopy_capture::{segment_name, CaptureAlert, CaptureConfig, VideoRing};
use jalopy_core::FakeClock;
use jalopy_daemon::EventWriter;
use jalopy_storage::{Store, StorePaths};
use tempfile::tempdir;
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn zero_byte_stitch_alerts_and_leaves_row_unattached() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("store")).unwrap();
    let store = Store::open(&StorePaths::under(&dir.path().join("store"))).unwrap();
    store.reconcile_on_boot().unwrap();

    let config = CaptureConfig {
        buffer_dir: dir.path().join("buffer"),
        output_dir: dir.path().join("clips"),
        min_segment_bytes: 100,
        post_event_s: 0,
        ..CaptureConfig::default()
    };
    std::fs::create_dir_all(&config.buffer_dir).unwrap();
    std::fs::create_dir_all(&config.output_dir).unwrap();
    for index in 1..=4u64 {
        std::fs::write(config.buffer_dir.join(segment_name(index)), vec![1u8; 500]).unwrap();
    }

    let pipeline = FakePipeline::new();
    pipeline.set_concat_writes_empty(true);
    let (alerts_tx, mut alerts_rx) = mpsc::channel(8);
    let video = VideoRing::new(pipeline.clone(), config, alerts_tx);
    let writer = EventWriter::new(store.clone(), video, FakeClock::new());

    let id = writer.manual_capture().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    // The alert fired, the callback path returned null, and the event
    // row still has no artifact.
    assert_eq!(alerts_rx.try_recv().unwrap(), CaptureAlert::SaveFailed { prefix: "manual".into() });
    let event = store.event(id).unwrap();
    assert!(event.video_path.is_none());

    // The zero-byte artifact stays on disk for offline inspection, but
    // nothing references it.
    let clips: Vec<_> = std::fs::read_dir(dir.path().join("clips"))
        .unwrap()
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|x| x == "mp4"))
        .collect();
    assert_eq!(clips.len(), 1);
}
