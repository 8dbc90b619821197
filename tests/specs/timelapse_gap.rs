// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timelapse gap: 181 s of driving with no successful capture at a
//! 60 s interval and gap factor 3 restarts the encoder once.

use jalopy_adapters::FakePipeline;
use jalopy_capture::{Timelapse, TimelapseConfig, VideoRing};
use jalopy_core::{FakeClock, GpsFix, StatusBoard};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn gap_restarts_encoder_and_suppresses_repeat() {
    let dir = tempdir().unwrap();
    let pipeline = FakePipeline::new();
    let clock = FakeClock::new();
    let status = StatusBoard::new();

    let timelapse = Timelapse::new(
        pipeline.clone(),
        clock.clone(),
        TimelapseConfig {
            interval: Duration::from_secs(60),
            gap_factor: 3,
            min_speed_kph: 5.0,
            stills_dir: dir.path().join("tl"),
        },
        status.clone(),
    );

    let (alerts_tx, _alerts_rx) = mpsc::channel(8);
    let video = VideoRing::new(
        pipeline.clone(),
        jalopy_capture::CaptureConfig {
            buffer_dir: dir.path().join("buffer"),
            output_dir: dir.path().join("clips"),
            ..Default::default()
        },
        alerts_tx,
    );
    video.start().await.unwrap();

    // Moving the whole time, no capture succeeded for 181 s
    status.publish_fix(GpsFix { ts_ms: 0, lat: 0.0, lon: 0.0, speed_kph: 60.0, heading_deg: 0.0 });
    clock.advance(Duration::from_secs(181));

    // The supervisor's scan: gap check, then encoder kill+restart
    let gap = timelapse.check_gap().expect("gap past 3x interval");
    assert!(gap >= Duration::from_secs(181));
    video.restart_encoder("timelapse gap").await.unwrap();

    assert_eq!(pipeline.stop_calls(), 1);
    assert_eq!(pipeline.start_calls(), 2);

    // last_capture was reset: the same scan cycle cannot re-alarm
    assert!(timelapse.check_gap().is_none());

    // 90 s later, still under the threshold
    clock.advance(Duration::from_secs(90));
    assert!(timelapse.check_gap().is_none());

    video.stop().await;
}
