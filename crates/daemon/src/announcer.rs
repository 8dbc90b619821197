// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver-audible announcements.
//!
//! One owned instance, one serialized worker, a bounded queue of two
//! with drop-oldest overflow. Speech when a model is available, tone
//! patterns otherwise. Announcing never blocks the caller; playback
//! failures are swallowed and logged. `init` is idempotent and
//! `cleanup` precedes any re-init.

use jalopy_adapters::{AudioError, AudioSynth, TonePattern};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const QUEUE_CAP: usize = 2;

/// One utterance request
#[derive(Debug, Clone, PartialEq)]
pub enum Announcement {
    /// Subsystems came back: upbeat cue plus the summary when speech is up
    Recovered(String),
    /// Persistent trouble: alarm cue plus the summary
    Alarm(String),
    /// Short acknowledgment chirp (manual capture, sync done)
    Ack,
}

struct AnnouncerState {
    queue: VecDeque<Announcement>,
    initialized: bool,
    ever_initialized: bool,
    worker: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

/// The audio actor
#[derive(Clone)]
pub struct Announcer<A: AudioSynth> {
    audio: A,
    state: Arc<Mutex<AnnouncerState>>,
    wake: Arc<Notify>,
}

impl<A: AudioSynth> Announcer<A> {
    pub fn new(audio: A) -> Self {
        Self {
            audio,
            state: Arc::new(Mutex::new(AnnouncerState {
                queue: VecDeque::new(),
                initialized: false,
                ever_initialized: false,
                worker: None,
                cancel: None,
            })),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Prepare the device and start the worker. Idempotent.
    pub async fn init(&self) -> Result<(), AudioError> {
        if self.state.lock().initialized {
            return Ok(());
        }
        self.audio.init().await?;

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(self.clone().run_worker(cancel.clone()));
        let mut state = self.state.lock();
        state.initialized = true;
        state.ever_initialized = true;
        state.worker = Some(worker);
        state.cancel = Some(cancel);
        Ok(())
    }

    /// Stop the worker and release the device. Always precedes re-init.
    pub async fn cleanup(&self) {
        let (cancel, worker) = {
            let mut state = self.state.lock();
            state.initialized = false;
            (state.cancel.take(), state.worker.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(worker) = worker {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(2), worker).await;
        }
        self.audio.cleanup().await;
    }

    /// Whether the worker task is alive. Only meaningful once the
    /// subsystem has been initialized at least once.
    pub fn is_alive(&self) -> bool {
        self.state.lock().worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn ever_initialized(&self) -> bool {
        self.state.lock().ever_initialized
    }

    /// Enqueue an announcement. Never blocks; the oldest queued entry is
    /// dropped on overflow.
    pub fn announce(&self, announcement: Announcement) {
        {
            let mut state = self.state.lock();
            if !state.initialized {
                tracing::debug!(?announcement, "announcer not initialized, dropped");
                return;
            }
            if state.queue.len() >= QUEUE_CAP {
                let dropped = state.queue.pop_front();
                tracing::debug!(?dropped, "announcement queue full, dropped oldest");
            }
            state.queue.push_back(announcement);
        }
        self.wake.notify_one();
    }

    async fn run_worker(self, cancel: CancellationToken) {
        loop {
            let next = self.state.lock().queue.pop_front();
            let Some(announcement) = next else {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.wake.notified() => continue,
                }
            };
            // Best-effort: failures logged, never propagated
            if let Err(e) = self.play(&announcement).await {
                tracing::warn!(error = %e, "announcement playback failed");
            }
        }
    }

    async fn play(&self, announcement: &Announcement) -> Result<(), AudioError> {
        match announcement {
            Announcement::Recovered(text) => {
                if self.audio.has_speech() {
                    self.audio.speak(text).await
                } else {
                    self.audio.tone(TonePattern::Recovered).await
                }
            }
            Announcement::Alarm(text) => {
                if self.audio.has_speech() {
                    self.audio.speak(text).await
                } else {
                    self.audio.tone(TonePattern::Alarm).await
                }
            }
            Announcement::Ack => self.audio.tone(TonePattern::Ack).await,
        }
    }
}

#[cfg(test)]
#[path = "announcer_tests.rs"]
mod tests;
