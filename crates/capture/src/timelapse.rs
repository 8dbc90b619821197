// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timelapse capture with gap detection.
//!
//! While the vehicle is moving, a still frame is captured on a fixed
//! interval. The gap check runs inside the supervisor's health scan: no
//! successful capture for gap_factor × interval while moving means the
//! encoder has quietly died mid-pipeline, so the supervisor restarts it.
//! The check resets `last_capture` itself to keep one gap from alarming
//! on every scan.

use jalopy_adapters::MediaPipeline;
use jalopy_core::{Clock, StatusBoard};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct TimelapseConfig {
    pub interval: Duration,
    /// Gap threshold = factor × interval
    pub gap_factor: u32,
    /// Below this speed the vehicle is parked and no captures are due
    pub min_speed_kph: f64,
    pub stills_dir: PathBuf,
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            gap_factor: 3,
            min_speed_kph: 5.0,
            stills_dir: PathBuf::from("timelapse"),
        }
    }
}

struct TimelapseShared {
    last_capture: Instant,
    cancel: Option<CancellationToken>,
}

/// Timelapse component
#[derive(Clone)]
pub struct Timelapse<P: MediaPipeline, C: Clock> {
    pipeline: P,
    clock: C,
    config: Arc<TimelapseConfig>,
    status: StatusBoard,
    shared: Arc<Mutex<TimelapseShared>>,
}

impl<P: MediaPipeline, C: Clock> Timelapse<P, C> {
    pub fn new(pipeline: P, clock: C, config: TimelapseConfig, status: StatusBoard) -> Self {
        let last_capture = clock.now();
        Self {
            pipeline,
            clock,
            config: Arc::new(config),
            status,
            shared: Arc::new(Mutex::new(TimelapseShared { last_capture, cancel: None })),
        }
    }

    pub fn start(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config.stills_dir)?;
        let cancel = CancellationToken::new();
        {
            let mut shared = self.shared.lock();
            if let Some(old) = shared.cancel.take() {
                old.cancel();
            }
            shared.cancel = Some(cancel.clone());
            shared.last_capture = self.clock.now();
        }

        let this = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(this.config.interval) => {}
                }
                this.capture_once().await;
            }
        });
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(cancel) = self.shared.lock().cancel.take() {
            cancel.cancel();
        }
    }

    async fn capture_once(&self) {
        if !self.moving() {
            return;
        }
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let output = self.config.stills_dir.join(format!("tl_{stamp}.jpg"));
        match self.pipeline.capture_still(&output).await {
            Ok(()) => {
                self.shared.lock().last_capture = self.clock.now();
                tracing::debug!(path = %output.display(), "timelapse frame captured");
            }
            Err(e) => {
                tracing::warn!(error = %e, "timelapse capture failed");
            }
        }
    }

    fn moving(&self) -> bool {
        self.status
            .snapshot()
            .speed_kph
            .is_some_and(|speed| speed >= self.config.min_speed_kph)
    }

    /// Supervisor-scan gap check. When a gap is found, the warning is
    /// logged and `last_capture` is reset to now so the same gap does not
    /// alarm again next scan. The caller restarts the encoder.
    pub fn check_gap(&self) -> Option<Duration> {
        if !self.moving() {
            return None;
        }
        let threshold = self.config.interval * self.config.gap_factor;
        let mut shared = self.shared.lock();
        let age = self.clock.now().saturating_duration_since(shared.last_capture);
        if age <= threshold {
            return None;
        }
        tracing::warn!(
            age_s = age.as_secs(),
            threshold_s = threshold.as_secs(),
            "timelapse_gap_detected"
        );
        shared.last_capture = self.clock.now();
        Some(age)
    }
}

#[cfg(test)]
#[path = "timelapse_tests.rs"]
mod tests;
