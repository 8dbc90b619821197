// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The video ring buffer and clip stitcher.
//!
//! Owns the encoder pipeline: starts it, reaps old segments down to the
//! retention window, watches for stalls, and services save requests. A
//! save copies frozen pre-roll segments aside, waits out the post-roll,
//! copies the newly completed segments, and stitches the lot into one
//! verified artifact while the recorder keeps going.

use crate::segments::{all_segment_files, scan_segments, segment_file_count, Segment};
use jalopy_adapters::{MediaPipeline, PipelineError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no segments available for save")]
    NoMaterial,
    #[error("stitched output failed verification (exists={exists}, size={size})")]
    VerificationFailed { exists: bool, size: u64 },
}

/// Driver-audible trouble from the capture path
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureAlert {
    SaveFailed { prefix: String },
    EncoderStalled { output_age: Duration },
    TimelapseGap { capture_age: Duration },
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub segment_seconds: u64,
    /// Complete segments retained; the in-flight one rides on top
    pub segment_count: usize,
    pub pre_event_s: u64,
    pub post_event_s: u64,
    pub min_segment_bytes: u64,
    /// Stall threshold = factor × segment length
    pub stall_factor: u32,
    pub overlay_enabled: bool,
    pub buffer_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            segment_seconds: 10,
            segment_count: 5,
            pre_event_s: 20,
            post_event_s: 10,
            min_segment_bytes: 4_096,
            stall_factor: 3,
            overlay_enabled: false,
            buffer_dir: PathBuf::from("buffer"),
            output_dir: PathBuf::from("clips"),
        }
    }
}

/// Evidence of a stalled encoder. `check_stall` returns this rather than
/// a bare bool so callers can log and announce the age.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StallInfo {
    pub output_age: Duration,
    pub threshold: Duration,
}

#[derive(Default)]
struct RingShared {
    cancel: Option<CancellationToken>,
    started_at: Option<SystemTime>,
}

/// Video ring buffer component
#[derive(Clone)]
pub struct VideoRing<P: MediaPipeline> {
    pipeline: P,
    config: Arc<CaptureConfig>,
    alerts_tx: mpsc::Sender<CaptureAlert>,
    shared: Arc<Mutex<RingShared>>,
}

impl<P: MediaPipeline> VideoRing<P> {
    pub fn new(pipeline: P, config: CaptureConfig, alerts_tx: mpsc::Sender<CaptureAlert>) -> Self {
        Self {
            pipeline,
            config: Arc::new(config),
            alerts_tx,
            shared: Arc::new(Mutex::new(RingShared::default())),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Create directories, start the encoder, and start the retention
    /// reaper.
    pub async fn start(&self) -> Result<(), CaptureError> {
        std::fs::create_dir_all(&self.config.buffer_dir)?;
        std::fs::create_dir_all(&self.config.output_dir)?;
        self.pipeline.start().await?;

        let cancel = CancellationToken::new();
        {
            let mut shared = self.shared.lock();
            if let Some(old) = shared.cancel.take() {
                old.cancel();
            }
            shared.cancel = Some(cancel.clone());
            shared.started_at = Some(SystemTime::now());
        }

        let this = self.clone();
        let period = Duration::from_secs((self.config.segment_seconds / 2).max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                this.enforce_retention();
            }
        });

        tracing::info!(
            buffer_dir = %self.config.buffer_dir.display(),
            segment_count = self.config.segment_count,
            "video ring started"
        );
        Ok(())
    }

    pub async fn stop(&self) {
        let cancel = self.shared.lock().cancel.take();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        self.pipeline.stop().await;
        tracing::info!("video ring stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.pipeline.is_running().await
    }

    /// Unlink oldest segments beyond retention. The directory never
    /// holds more than `segment_count + 1` segment files (the +1 being
    /// the in-flight one).
    pub fn enforce_retention(&self) {
        let files = all_segment_files(&self.config.buffer_dir);
        let keep = self.config.segment_count + 1;
        if files.len() <= keep {
            return;
        }
        for (index, path) in &files[..files.len() - keep] {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(index, "reaped segment"),
                Err(e) => tracing::warn!(index, error = %e, "segment unlink failed"),
            }
        }
    }

    /// Valid segments currently on disk
    pub fn segments(&self) -> Vec<Segment> {
        scan_segments(&self.config.buffer_dir, self.config.min_segment_bytes)
    }

    /// Segment files present, runts and in-flight included
    pub fn segment_file_count(&self) -> usize {
        segment_file_count(&self.config.buffer_dir)
    }

    /// Boot events need two segment files before a save is worth it:
    /// the newest is in-flight, so fewer than two means no material.
    pub fn ready_for_boot_capture(&self) -> bool {
        self.segment_file_count() >= 2
    }

    /// Nullable stall evidence: the newest output's age exceeded
    /// stall_factor × segment length while the encoder was running.
    pub async fn check_stall(&self) -> Option<StallInfo> {
        let threshold =
            Duration::from_secs(self.config.segment_seconds * u64::from(self.config.stall_factor));
        let reference = match self.pipeline.last_output_mtime().await {
            Some(mtime) => mtime,
            // Nothing written yet: measure from encoder start
            None => self.shared.lock().started_at?,
        };
        let output_age = SystemTime::now().duration_since(reference).unwrap_or_default();
        if output_age > threshold {
            Some(StallInfo { output_age, threshold })
        } else {
            None
        }
    }

    /// Kill and restart the encoder, announcing the reason.
    pub async fn restart_encoder(&self, reason: &str) -> Result<(), CaptureError> {
        tracing::warn!(reason, "killing and restarting encoder");
        self.pipeline.stop().await;
        self.pipeline.start().await?;
        self.shared.lock().started_at = Some(SystemTime::now());
        Ok(())
    }

    /// Save material: valid segments minus the in-flight newest file.
    fn save_material(&self) -> Vec<Segment> {
        let mut material = self.segments();
        if let Some((in_flight, _)) = all_segment_files(&self.config.buffer_dir).last() {
            material.retain(|s| s.index != *in_flight);
        }
        material
    }

    /// The save protocol. Returns the stitched clip path, or None after
    /// logging and announcing the failure.
    pub async fn save_event(&self, pre_s: u64, post_s: u64, prefix: &str) -> Option<PathBuf> {
        match self.save_event_inner(pre_s, post_s, prefix).await {
            Ok(path) => {
                tracing::info!(prefix, path = %path.display(), "clip saved");
                Some(path)
            }
            Err(e) => {
                tracing::error!(prefix, error = %e, "video save failed");
                let _ = self
                    .alerts_tx
                    .try_send(CaptureAlert::SaveFailed { prefix: prefix.to_string() });
                None
            }
        }
    }

    async fn save_event_inner(
        &self,
        pre_s: u64,
        post_s: u64,
        prefix: &str,
    ) -> Result<PathBuf, CaptureError> {
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.config.output_dir)?;

        // 1. Freeze the pre-roll: the last pre_s seconds of complete
        // segments, copied out so the reaper can't take them.
        let pre_count = (pre_s as usize).div_ceil(self.config.segment_seconds as usize).max(1);
        let material = self.save_material();
        let pre: Vec<Segment> =
            material.iter().rev().take(pre_count).rev().cloned().collect();
        let mut copied: Vec<PathBuf> = Vec::new();
        for seg in &pre {
            let dst = staging.path().join(file_name(&seg.path));
            tokio::fs::copy(&seg.path, &dst).await?;
            copied.push(dst);
        }
        let pre_max = pre.last().map(|s| s.index).unwrap_or_else(|| {
            all_segment_files(&self.config.buffer_dir).last().map(|(i, _)| *i).unwrap_or(0)
        });

        // 2. Let the post-roll accumulate, then pick up what completed.
        tokio::time::sleep(Duration::from_secs(post_s)).await;
        let post: Vec<Segment> = self
            .save_material()
            .into_iter()
            .filter(|s| s.index > pre_max)
            .collect();
        if post.is_empty() {
            tracing::info!(prefix, "video_save_post_event_empty");
        }
        for seg in &post {
            let dst = staging.path().join(file_name(&seg.path));
            tokio::fs::copy(&seg.path, &dst).await?;
            copied.push(dst);
        }

        if copied.is_empty() {
            return Err(CaptureError::NoMaterial);
        }

        // 3. Stitch without re-encode.
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let output = self.config.output_dir.join(format!("{prefix}_{stamp}.mp4"));
        self.pipeline.concat(&copied, &output).await?;

        // 4. Verify before reporting success.
        let (exists, size) = match std::fs::metadata(&output) {
            Ok(meta) => (true, meta.len()),
            Err(_) => (false, 0),
        };
        if !exists || size == 0 {
            tracing::error!(prefix, exists, size, "video_save_verification_failed");
            return Err(CaptureError::VerificationFailed { exists, size });
        }

        Ok(output)
    }
}

fn file_name(path: &Path) -> std::ffi::OsString {
    path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "segment.ts".into())
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
