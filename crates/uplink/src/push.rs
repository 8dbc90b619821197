// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cursor-driven batch push.
//!
//! Reads past the cursor, pushes, and advances only on acknowledged
//! delivery. The cursor never moves past data the sink has not taken,
//! and never regresses. Out-of-window rows are dropped (bounded per
//! batch) so one stale stretch cannot wedge the pipeline. Manual and
//! scheduled syncs share the single worker task, so they never overlap.

use crate::probe::Probe;
use crate::wire::encode_batch;
use jalopy_adapters::{FileSync, MetricsSink, SinkError};
use jalopy_core::Reading;
use jalopy_storage::Store;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct UplinkConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    /// Too-old rejections tolerated per batch before abandoning it
    pub max_too_old_retries: u32,
    /// Transport attempts per batch before waiting for the next cycle
    pub push_attempts: u32,
    pub retry_backoff: Duration,
    /// Wall-clock cap on one drain cycle
    pub cycle_deadline: Duration,
    /// Saved clips and sidecars synced from here
    pub output_dir: PathBuf,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            poll_interval: Duration::from_secs(60),
            max_too_old_retries: 20,
            push_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            cycle_deadline: Duration::from_secs(30),
            output_dir: PathBuf::from("clips"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UplinkStats {
    pub batches_pushed: u64,
    pub too_old_dropped: u64,
    pub files_synced: u64,
}

enum PushResult {
    /// Batch acknowledged (some rows possibly dropped as out-of-window)
    Delivered { dropped: usize },
    /// Nothing acknowledged; retry next cycle
    Failed,
}

/// Uplink component
#[derive(Clone)]
pub struct Uplink<S: MetricsSink, F: FileSync> {
    store: Store,
    sink: S,
    files: F,
    probe: Probe,
    config: Arc<UplinkConfig>,
    stats: Arc<Mutex<UplinkStats>>,
    manual_tx: mpsc::Sender<()>,
    manual_rx: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
}

impl<S: MetricsSink, F: FileSync> Uplink<S, F> {
    pub fn new(store: Store, sink: S, files: F, probe: Probe, config: UplinkConfig) -> Self {
        let (manual_tx, manual_rx) = mpsc::channel(1);
        Self {
            store,
            sink,
            files,
            probe,
            config: Arc::new(config),
            stats: Arc::default(),
            manual_tx,
            manual_rx: Arc::new(Mutex::new(Some(manual_rx))),
        }
    }

    pub fn stats(&self) -> UplinkStats {
        *self.stats.lock()
    }

    /// Request an immediate sync. Coalesces with any pending request;
    /// never runs concurrently with a scheduled cycle.
    pub fn manual_sync(&self) {
        if self.manual_tx.try_send(()).is_err() {
            tracing::debug!("manual sync already pending");
        }
    }

    /// Spawn the worker. One task serializes scheduled and manual syncs.
    pub fn start(&self, cancel: CancellationToken) {
        let Some(mut manual_rx) = self.manual_rx.lock().take() else {
            tracing::warn!("uplink already started");
            return;
        };
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let manual = tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(this.config.poll_interval) => false,
                    _ = manual_rx.recv() => true,
                };
                if !this.probe.is_up().await {
                    if manual {
                        tracing::info!("manual sync requested while offline, skipped");
                    }
                    continue;
                }
                this.run_cycle().await;
            }
        });
    }

    /// Drain the store toward the sink until caught up, the deadline
    /// lapses, or the link fails. Then reconcile saved files.
    pub async fn run_cycle(&self) {
        let deadline = tokio::time::Instant::now() + self.config.cycle_deadline;

        loop {
            let rows = self.store.read_batch(self.store.cursor(), self.config.batch_size);
            let Some((last_id, _)) = rows.last() else {
                break;
            };
            let last_id = *last_id;
            let full_batch = rows.len() == self.config.batch_size;

            match self.push_rows(rows).await {
                PushResult::Delivered { dropped } => {
                    if let Err(e) = self.store.advance_cursor(last_id) {
                        tracing::error!(error = %e, last_id, "cursor advance failed");
                        break;
                    }
                    let mut stats = self.stats.lock();
                    stats.batches_pushed += 1;
                    stats.too_old_dropped += dropped as u64;
                    drop(stats);
                    if dropped > 0 {
                        tracing::info!(dropped, last_id, "batch delivered with out-of-window rows dropped");
                    }
                }
                PushResult::Failed => break,
            }

            if !full_batch {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::debug!("uplink cycle deadline reached, remainder next cycle");
                break;
            }
        }

        self.sync_files().await;
    }

    async fn push_rows(&self, mut rows: Vec<(u64, Reading)>) -> PushResult {
        let mut dropped = 0usize;
        let mut too_old_retries = 0u32;
        let mut transport_attempts = 0u32;

        loop {
            if rows.is_empty() {
                // The whole batch was out of window; the cursor still
                // advances past it.
                return PushResult::Delivered { dropped };
            }

            let (payload, samples) = match encode_batch(&rows) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::error!(error = %e, "batch encode failed");
                    return PushResult::Failed;
                }
            };

            match self.sink.push(payload, samples).await {
                Ok(()) => return PushResult::Delivered { dropped },
                Err(SinkError::TooOld { cutoff_ms }) => {
                    too_old_retries += 1;
                    if too_old_retries > self.config.max_too_old_retries {
                        tracing::warn!(
                            retries = too_old_retries - 1,
                            "too-old retry budget exhausted, batch abandoned until next cycle"
                        );
                        return PushResult::Failed;
                    }

                    let before = rows.len();
                    match cutoff_ms {
                        Some(cutoff) => rows.retain(|(_, r)| r.ts_ms >= cutoff),
                        None => {
                            rows.remove(0);
                        }
                    }
                    // The sink said too-old but named nothing we hold:
                    // shed the oldest row to guarantee progress.
                    if rows.len() == before && !rows.is_empty() {
                        rows.remove(0);
                    }
                    let shed = before - rows.len();
                    dropped += shed;
                    tracing::warn!(shed, remaining = rows.len(), "sink rejected out-of-window samples");
                }
                Err(e) => {
                    transport_attempts += 1;
                    if transport_attempts >= self.config.push_attempts {
                        tracing::warn!(error = %e, attempts = transport_attempts, "push failed, backing off");
                        return PushResult::Failed;
                    }
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
            }
        }
    }

    async fn sync_files(&self) {
        if !self.config.output_dir.is_dir() {
            return;
        }
        match self.files.sync_dir(&self.config.output_dir).await {
            Ok(result) => {
                if result.transferred > 0 {
                    tracing::info!(transferred = result.transferred, "file sync complete");
                }
                self.stats.lock().files_synced += result.transferred as u64;
            }
            Err(e) => {
                tracing::warn!(error = %e, "file sync failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;
