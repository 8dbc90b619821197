// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot with an empty ring: the boot event row is recorded, the video
//! save is skipped until the encoder has produced real material.

use jalopy_adapters::FakePipeline;
use jalopy_capture::{segment_name, CaptureConfig, VideoRing};
use jalopy_core::{EventKind, FakeClock};
use jalopy_daemon::EventWriter;
use jalopy_storage::{Store, StorePaths};
use tempfile::tempdir;
use tokio::sync::mpsc;

struct Rig {
    store: Store,
    pipeline: FakePipeline,
    writer: EventWriter<FakePipeline, FakeClock>,
    buffer_dir: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn rig() -> Rig {
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
    let buffer_dir = config.buffer_dir.clone();

    let pipeline = FakePipeline::new();
    let (alerts_tx, _alerts_rx) = mpsc::channel(8);
    let video = VideoRing::new(pipeline.clone(), config, alerts_tx);
    let writer = EventWriter::new(store.clone(), video, FakeClock::new());
    Rig { store, pipeline, writer, buffer_dir, _dir: dir }
}

#[tokio::test(start_paused = true)]
async fn boot_with_one_segment_skips_save_but_records_event() {
    let r = rig();
    std::fs::write(r.buffer_dir.join(segment_name(1)), vec![1u8; 500]).unwrap();

    let id = r.writer.boot_capture().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    let event = r.store.event(id).unwrap();
    assert_eq!(event.kind, EventKind::Boot);
    assert!(!event.is_open(), "boot events are point-in-time");
    assert!(event.video_path.is_none());
    assert!(r.pipeline.concat_calls().is_empty(), "no save was spawned");
}

#[tokio::test(start_paused = true)]
async fn boot_with_material_attaches_a_clip() {
    let r = rig();
    for index in 1..=3u64 {
        std::fs::write(r.buffer_dir.join(segment_name(index)), vec![1u8; 500]).unwrap();
    }

    let id = r.writer.boot_capture().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    let event = r.store.event(id).unwrap();
    assert!(event.video_path.is_some());
    assert_eq!(r.pipeline.concat_calls().len(), 1);
}
