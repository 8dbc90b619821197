// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event writer: turns detector actions and capture triggers into
//! durable rows plus clip saves.
//!
//! Ordering contract: the event row is committed before its video save
//! begins, and the artifact path is attached only after the stitched
//! clip passes verification. A failed save never mutates the row.

use jalopy_adapters::MediaPipeline;
use jalopy_capture::{write_sidecar, VideoRing};
use jalopy_core::{Clock, EventKind, Peaks};
use jalopy_sampler::DetectorAction;
use jalopy_storage::{Store, StoreError, TelemetryState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Maps detector actions onto the store and the video ring
#[derive(Clone)]
pub struct EventWriter<P: MediaPipeline, C: Clock> {
    store: Store,
    video: VideoRing<P>,
    clock: C,
    pre_event_s: u64,
    post_event_s: u64,
    open_ids: Arc<Mutex<HashMap<EventKind, u64>>>,
    last_closed: Arc<Mutex<HashMap<EventKind, u64>>>,
}

impl<P: MediaPipeline, C: Clock> EventWriter<P, C> {
    pub fn new(store: Store, video: VideoRing<P>, clock: C) -> Self {
        let pre_event_s = video.config().pre_event_s;
        let post_event_s = video.config().post_event_s;
        Self {
            store,
            video,
            clock,
            pre_event_s,
            post_event_s,
            open_ids: Arc::default(),
            last_closed: Arc::default(),
        }
    }

    /// Consume detector actions until cancelled
    pub fn spawn(&self, mut actions_rx: mpsc::Receiver<DetectorAction>, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let action = tokio::select! {
                    _ = cancel.cancelled() => break,
                    action = actions_rx.recv() => match action {
                        Some(action) => action,
                        None => break,
                    },
                };
                this.handle_action(action).await;
            }
        });
    }

    pub async fn handle_action(&self, action: DetectorAction) {
        match action {
            DetectorAction::Open { kind, t_start_ms } => {
                match self.store.open_event(kind, t_start_ms, Peaks::default()) {
                    Ok(id) => {
                        tracing::info!(event_id = id, %kind, t_start_ms, "event opened");
                        self.open_ids.lock().insert(kind, id);
                    }
                    Err(e) => tracing::error!(%kind, error = %e, "event open failed"),
                }
            }
            DetectorAction::Close { kind, t_end_ms, peaks } => {
                let id = {
                    let mut open = self.open_ids.lock();
                    open.remove(&kind)
                };
                let Some(id) = id else {
                    tracing::warn!(%kind, "close without a tracked open event");
                    return;
                };
                if let Err(e) = self.store.close_event(id, t_end_ms, Some(peaks), false) {
                    tracing::error!(event_id = id, error = %e, "event close failed");
                    return;
                }
                tracing::info!(event_id = id, %kind, t_end_ms, "event closed");
                self.last_closed.lock().insert(kind, id);

                // Row is durable; the clip save proceeds concurrently.
                let this = self.clone();
                tokio::spawn(async move { this.save_and_attach(id, kind.as_str()).await });
            }
            DetectorAction::Extend { kind, t_end_ms, peaks } => {
                let id = self.last_closed.lock().get(&kind).copied();
                let Some(id) = id else {
                    tracing::warn!(%kind, "extend without a prior close");
                    return;
                };
                let merged = self
                    .store
                    .event(id)
                    .map(|ev| TelemetryState::merged_peaks(ev.peaks, peaks));
                match self.store.close_event(id, t_end_ms, merged, false) {
                    Ok(()) => tracing::info!(event_id = id, %kind, t_end_ms, "event extended"),
                    Err(e) => tracing::error!(event_id = id, error = %e, "event extend failed"),
                }
            }
        }
    }

    /// MANUAL_CAPTURE: one event row, at most one artifact
    pub async fn manual_capture(&self) -> Result<u64, StoreError> {
        let now = self.clock.epoch_ms();
        let id = self.store.open_event(EventKind::Manual, now, Peaks::default())?;
        self.store.close_event(id, now, None, false)?;
        tracing::info!(event_id = id, "manual capture requested");

        let this = self.clone();
        tokio::spawn(async move { this.save_and_attach(id, "manual").await });
        Ok(id)
    }

    /// Boot event. The save is skipped (metadata still recorded) until
    /// the encoder has at least two segment files; the newest is
    /// in-flight, so fewer means no usable material.
    pub async fn boot_capture(&self) -> Result<u64, StoreError> {
        let now = self.clock.epoch_ms();
        let id = self.store.open_event(EventKind::Boot, now, Peaks::default())?;
        self.store.close_event(id, now, None, false)?;

        if !self.video.ready_for_boot_capture() {
            tracing::info!(
                event_id = id,
                segments = self.video.segment_file_count(),
                "boot_capture_skipped_no_segments"
            );
            return Ok(id);
        }

        let this = self.clone();
        tokio::spawn(async move { this.save_and_attach(id, "boot").await });
        Ok(id)
    }

    async fn save_and_attach(&self, id: u64, prefix: &str) {
        let Some(path) = self.video.save_event(self.pre_event_s, self.post_event_s, prefix).await
        else {
            // save_event already logged and alerted; the row keeps its
            // null artifact path.
            return;
        };

        if let Err(e) = self.store.attach_video(id, &path) {
            tracing::error!(event_id = id, error = %e, "video attach failed");
            return;
        }
        if let Some(event) = self.store.event(id) {
            match write_sidecar(&event, &path) {
                Ok(sidecar) => {
                    tracing::debug!(event_id = id, sidecar = %sidecar.display(), "sidecar written")
                }
                Err(e) => tracing::warn!(event_id = id, error = %e, "sidecar write failed"),
            }
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
