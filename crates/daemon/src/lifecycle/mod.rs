// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, run loop, shutdown.

mod startup;
pub use startup::startup;

use crate::announcer::{Announcement, Announcer};
use crate::config::{Config, ConfigError};
use crate::control::ControlSignal;
use crate::events::EventWriter;
use jalopy_adapters::{ProcessAudioSynth, ProcessEncoder};
use jalopy_capture::{CaptureError, Timelapse, VideoRing};
use jalopy_core::{StatusBoard, SystemClock};
use jalopy_storage::{Store, StoreError};
use jalopy_uplink::Uplink;
use std::fs::File;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Grace period for worker tasks to observe cancellation. Tasks poll
/// the token at their loop heads, so one second covers them; the
/// process supervisor enforces the hard 30-second kill.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The assembled daemon, ready for [`Daemon::run`]
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    pub(crate) lock_file: File,
    pub(crate) lock_path: std::path::PathBuf,
    pub store: Store,
    pub status: StatusBoard,
    pub(crate) cancel: CancellationToken,
    pub(crate) control_rx: mpsc::Receiver<ControlSignal>,
    pub(crate) events: EventWriter<ProcessEncoder, SystemClock>,
    pub(crate) uplink: Option<Uplink<jalopy_adapters::HttpMetricsSink, jalopy_adapters::RsyncFileSync>>,
    pub(crate) video: VideoRing<ProcessEncoder>,
    pub(crate) timelapse: Option<Timelapse<ProcessEncoder, SystemClock>>,
    pub(crate) announcer: Announcer<ProcessAudioSynth>,
}

impl Daemon {
    /// Serve control signals until shutdown. Returns the process exit
    /// code: ordinary recovery paths never exit; only shutdown does.
    pub async fn run(mut self) -> i32 {
        info!("daemon running");
        loop {
            let Some(signal) = self.control_rx.recv().await else {
                warn!("control channel closed, shutting down");
                break;
            };
            match signal {
                ControlSignal::ManualCapture => {
                    info!("manual capture signal");
                    match self.events.manual_capture().await {
                        Ok(_) => self.announcer.announce(Announcement::Ack),
                        Err(e) => tracing::error!(error = %e, "manual capture failed"),
                    }
                }
                ControlSignal::ManualSync => {
                    info!("manual sync signal");
                    match &self.uplink {
                        Some(uplink) => uplink.manual_sync(),
                        None => warn!("manual sync requested but uplink is not configured"),
                    }
                }
                ControlSignal::Shutdown => {
                    info!("shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        0
    }

    /// Stop workers, take a final checkpoint, release the lock.
    async fn shutdown(&mut self) {
        info!("shutting down");

        // 1. Cancel every worker; they poll the token at their loop heads
        self.cancel.cancel();

        // 2. Stop the capture path explicitly so the encoder is reaped
        if let Some(timelapse) = &self.timelapse {
            timelapse.stop();
        }
        self.video.stop().await;
        self.announcer.cleanup().await;

        // 3. Let stragglers drain within the grace window
        tokio::time::sleep(SHUTDOWN_GRACE).await;

        // 4. Final checkpoint: next boot starts from a snapshot, not a
        // long WAL replay
        match self.store.checkpoint() {
            Ok(result) => info!(seq = result.seq, "final checkpoint written"),
            Err(e) => warn!(error = %e, "final checkpoint failed"),
        }

        // 5. Remove the PID file; the lock itself releases on drop
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove pid file");
            }
        }

        info!("daemon shutdown complete");
    }
}
