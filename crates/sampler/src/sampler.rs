// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The high-rate sampling loop.
//!
//! Reads the IMU at a fixed period with overshoot-compensated pacing,
//! feeds the inertial ring, and drives the detector. Read failures are
//! counted; a run of them declares a bus lockup and enters the bounded
//! escalation: reset + re-init with growing backoff, ending in a reboot
//! request to the supervisor. Device init at startup runs through the
//! identical escalation so an at-boot locked bus does not turn into a
//! process restart loop.

use crate::detector::{Detector, DetectorAction, DetectorConfig};
use crate::ring::InertialRing;
use jalopy_adapters::ImuAdapter;
use jalopy_core::{Clock, StatusBoard};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("bus recovery budget exhausted during init")]
    InitExhausted,
    #[error("sampler stopped during init")]
    Cancelled,
}

/// Out-of-band reports to the supervisor
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerNotice {
    /// A read succeeded after one or more bus resets
    BusRecovered { resets: u32 },
    /// Escalation exhausted; the process should be rebooted
    RebootRequested { reason: String },
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub period: Duration,
    /// Consecutive read failures that declare a bus lockup
    pub consecutive_failure_threshold: u32,
    /// Reset attempts before requesting a reboot
    pub max_resets: u32,
    /// Backoff before each reset attempt, indexed by attempt number
    pub backoff_schedule: Vec<Duration>,
    /// Inertial ring capacity, sized to the pre-event window
    pub ring_capacity: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            consecutive_failure_threshold: 5,
            max_resets: 3,
            backoff_schedule: vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(5),
            ],
            ring_capacity: 1_000,
        }
    }
}

#[derive(Default)]
struct Shared {
    /// Reset attempts in the current escalation. Persists across failure
    /// windows within one process lifetime; cleared on successful
    /// recovery and on explicit stop.
    reset_count: u32,
    last_sample_at: Option<std::time::Instant>,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// High-rate sampler component
#[derive(Clone)]
pub struct Sampler<I: ImuAdapter, C: Clock> {
    imu: I,
    clock: C,
    config: Arc<SamplerConfig>,
    detector_config: Arc<DetectorConfig>,
    ring: InertialRing,
    status: StatusBoard,
    actions_tx: mpsc::Sender<DetectorAction>,
    notices_tx: mpsc::Sender<SamplerNotice>,
    shared: Arc<Mutex<Shared>>,
}

impl<I: ImuAdapter, C: Clock> Sampler<I, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        imu: I,
        clock: C,
        config: SamplerConfig,
        detector_config: DetectorConfig,
        status: StatusBoard,
        actions_tx: mpsc::Sender<DetectorAction>,
        notices_tx: mpsc::Sender<SamplerNotice>,
    ) -> Self {
        let ring = InertialRing::new(config.ring_capacity);
        Self {
            imu,
            clock,
            config: Arc::new(config),
            detector_config: Arc::new(detector_config),
            ring,
            status,
            actions_tx,
            notices_tx,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn ring(&self) -> InertialRing {
        self.ring.clone()
    }

    /// Initialize the device (under the escalation policy) and start the
    /// sampling task.
    pub async fn start(&self) -> Result<(), SamplerError> {
        if self.is_running() {
            return Ok(());
        }
        let cancel = CancellationToken::new();
        self.shared.lock().cancel = Some(cancel.clone());

        self.init_with_escalation(&cancel).await?;

        let this = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { this.run_loop(token).await });
        self.shared.lock().handle = Some(handle);
        tracing::info!("sampler started");
        Ok(())
    }

    /// Stop the sampling task. A clean stop begins a fresh escalation
    /// budget: `reset_count` goes back to zero.
    pub async fn stop(&self) {
        let (cancel, handle) = {
            let mut shared = self.shared.lock();
            (shared.cancel.take(), shared.handle.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                tracing::warn!("sampler task did not exit in time");
            }
        }
        let mut shared = self.shared.lock();
        shared.reset_count = 0;
        shared.last_sample_at = None;
        tracing::info!("sampler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Time since the last published sample
    pub fn last_sample_age(&self) -> Option<Duration> {
        let at = self.shared.lock().last_sample_at?;
        Some(self.clock.now().saturating_duration_since(at))
    }

    pub fn reset_count(&self) -> u32 {
        self.shared.lock().reset_count
    }

    async fn init_with_escalation(&self, cancel: &CancellationToken) -> Result<(), SamplerError> {
        loop {
            match self.imu.init().await {
                Ok(()) => {
                    let resets = {
                        let mut shared = self.shared.lock();
                        std::mem::take(&mut shared.reset_count)
                    };
                    if resets > 0 {
                        tracing::info!(resets, "i2c_bus_recovery_successful");
                        let _ =
                            self.notices_tx.send(SamplerNotice::BusRecovered { resets }).await;
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "imu init failed");
                    match self.escalate("imu init failed", cancel).await {
                        Escalation::Attempted => continue,
                        Escalation::Exhausted => return Err(SamplerError::InitExhausted),
                        Escalation::Cancelled => return Err(SamplerError::Cancelled),
                    }
                }
            }
        }
    }

    /// One reset attempt under the escalation policy. Increments
    /// `reset_count`, requests a reboot once the budget is exhausted.
    async fn escalate(&self, reason: &str, cancel: &CancellationToken) -> Escalation {
        let attempt = {
            let mut shared = self.shared.lock();
            shared.reset_count += 1;
            shared.reset_count
        };

        if attempt > self.config.max_resets {
            tracing::error!(
                reset_count = attempt - 1,
                max_resets = self.config.max_resets,
                "i2c_max_resets_exceeded"
            );
            let _ = self
                .notices_tx
                .send(SamplerNotice::RebootRequested {
                    reason: format!("i2c unrecoverable: {reason}"),
                })
                .await;
            return Escalation::Exhausted;
        }

        let backoff = self
            .config
            .backoff_schedule
            .get(attempt as usize - 1)
            .or(self.config.backoff_schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO);

        tracing::warn!(reset_attempt = attempt, backoff_s = backoff.as_secs(), "i2c_bus_lockup_detected");

        if !backoff.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Escalation::Cancelled,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        match self.imu.bus_reset().await {
            Ok(()) => tracing::info!(reset_attempt = attempt, "bus reset sequence applied"),
            Err(e) => tracing::warn!(reset_attempt = attempt, error = %e, "bus reset failed"),
        }
        Escalation::Attempted
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        let period = self.config.period;
        let mut detector = Detector::new((*self.detector_config).clone());
        let mut failures: u32 = 0;
        let mut deadline = tokio::time::Instant::now() + period;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.imu.read_sample().await {
                Ok(raw) => {
                    failures = 0;
                    let resets = {
                        let mut shared = self.shared.lock();
                        std::mem::take(&mut shared.reset_count)
                    };
                    if resets > 0 {
                        tracing::info!(resets, "i2c_bus_recovery_successful");
                        let _ =
                            self.notices_tx.send(SamplerNotice::BusRecovered { resets }).await;
                    }

                    let sample = jalopy_core::ImuSample { ts_ms: self.clock.epoch_ms(), ..raw };
                    self.ring.push(sample);
                    self.status.publish_accel_magnitude(sample.magnitude());
                    self.shared.lock().last_sample_at = Some(self.clock.now());

                    for action in detector.step(&sample) {
                        if self.actions_tx.try_send(action).is_err() {
                            tracing::warn!("detector action channel full, dropped");
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::debug!(error = %e, failures, "imu read failed");
                    if failures >= self.config.consecutive_failure_threshold {
                        failures = 0;
                        match self.escalate("consecutive read failures", &cancel).await {
                            Escalation::Attempted => {
                                // Re-init after the bus reset; failures from
                                // here count toward the next attempt.
                                if let Err(e) = self.imu.init().await {
                                    tracing::warn!(error = %e, "device re-init failed");
                                }
                            }
                            Escalation::Exhausted => break,
                            Escalation::Cancelled => break,
                        }
                    }
                }
            }

            // Deadline pacing: compensate overshoot instead of sleeping a
            // naive fixed period. A slip of more than one period logs and
            // re-bases rather than accumulating missed ticks.
            let now = tokio::time::Instant::now();
            if now > deadline + period {
                let slipped = now.saturating_duration_since(deadline);
                tracing::warn!(slipped_ms = slipped.as_millis() as u64, "sample_loop_jitter");
                deadline = now + period;
            } else {
                deadline += period;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }
}

enum Escalation {
    Attempted,
    Exhausted,
    Cancelled,
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
