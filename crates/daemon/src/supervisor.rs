// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-healing supervisor.
//!
//! A fixed-period scan walks the health checklist, accumulating issues
//! and recoveries, and applies bounded recovery per check: restart the
//! sampler (reboot on exhaustion), kill-and-restart a stalled encoder,
//! re-init a dead audio worker (only if it ever came up), alert on disk
//! pressure without deleting anything. A separate 5-second loop samples
//! CPU temperature with edge-triggered audible alerts. Only the sampler
//! recovery path may request a process reboot.

use crate::announcer::{Announcement, Announcer};
use jalopy_adapters::{
    AudioSynth, ImuAdapter, MediaPipeline, RebootAdapter, ThermalProbe,
};
use jalopy_capture::{CaptureAlert, Timelapse, VideoRing};
use jalopy_core::{Clock, StatusBoard, THROTTLE_SOFT_TEMP};
use jalopy_sampler::{CollectorHandle, Sampler, SamplerNotice};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub health_period: Duration,
    pub thermal_warn_c: f64,
    pub thermal_throttle_c: f64,
    pub thermal_period: Duration,
    pub disk_warn_pct: u8,
    pub disk_critical_pct: u8,
    pub gps_max_age: Duration,
    pub lowrate_max_age: Duration,
    pub sampler_restart_attempts: u32,
    pub sampler_restart_backoff: Duration,
    /// Filesystem whose free space gates capture and storage
    pub disk_path: PathBuf,
    /// Sampler period, for the 3×P freshness check
    pub sampler_period: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_period: Duration::from_secs(30),
            thermal_warn_c: 70.0,
            thermal_throttle_c: 80.0,
            thermal_period: Duration::from_secs(5),
            disk_warn_pct: 80,
            disk_critical_pct: 90,
            gps_max_age: Duration::from_secs(30),
            lowrate_max_age: Duration::from_secs(15),
            sampler_restart_attempts: 3,
            sampler_restart_backoff: Duration::from_secs(5),
            disk_path: PathBuf::from("/var/lib/jalopy"),
            sampler_period: Duration::from_millis(10),
        }
    }
}

/// Filesystem usage seam (statvfs in production)
pub trait DiskProbe: Clone + Send + Sync + 'static {
    fn used_pct(&self, path: &Path) -> Option<u8>;
}

/// Reads occupancy from statvfs
#[derive(Clone, Copy, Debug, Default)]
pub struct StatvfsDisk;

impl DiskProbe for StatvfsDisk {
    fn used_pct(&self, path: &Path) -> Option<u8> {
        let stat = nix::sys::statvfs::statvfs(path).ok()?;
        let blocks = stat.blocks() as u64;
        if blocks == 0 {
            return None;
        }
        let available = stat.blocks_available() as u64;
        let used = blocks.saturating_sub(available);
        Some(((used * 100) / blocks).min(100) as u8)
    }
}

/// Fixed-percentage probe for tests and soak rigs
#[derive(Clone, Copy, Debug)]
pub struct FixedDisk(pub u8);

impl DiskProbe for FixedDisk {
    fn used_pct(&self, _path: &Path) -> Option<u8> {
        Some(self.0)
    }
}

/// One scan's findings
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub issues: Vec<String>,
    pub recovered: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ThermalZone {
    Normal,
    Warn,
    Throttle,
}

/// The supervisor component
#[derive(Clone)]
pub struct Supervisor<I, P, A, R, T, D, C>
where
    I: ImuAdapter,
    P: MediaPipeline,
    A: AudioSynth,
    R: RebootAdapter,
    T: ThermalProbe,
    D: DiskProbe,
    C: Clock,
{
    sampler: Option<Sampler<I, C>>,
    collectors: Option<CollectorHandle>,
    video: VideoRing<P>,
    timelapse: Option<Timelapse<P, C>>,
    announcer: Announcer<A>,
    reboot: R,
    thermal: T,
    disk: D,
    clock: C,
    status: StatusBoard,
    config: Arc<SupervisorConfig>,
    prev_issues: Arc<Mutex<HashSet<String>>>,
    thermal_zone: Arc<Mutex<ThermalZone>>,
}

impl<I, P, A, R, T, D, C> Supervisor<I, P, A, R, T, D, C>
where
    I: ImuAdapter,
    P: MediaPipeline,
    A: AudioSynth,
    R: RebootAdapter,
    T: ThermalProbe,
    D: DiskProbe,
    C: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sampler: Option<Sampler<I, C>>,
        collectors: Option<CollectorHandle>,
        video: VideoRing<P>,
        timelapse: Option<Timelapse<P, C>>,
        announcer: Announcer<A>,
        reboot: R,
        thermal: T,
        disk: D,
        clock: C,
        status: StatusBoard,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            sampler,
            collectors,
            video,
            timelapse,
            announcer,
            reboot,
            thermal,
            disk,
            clock,
            status,
            config: Arc::new(config),
            prev_issues: Arc::default(),
            thermal_zone: Arc::new(Mutex::new(ThermalZone::Normal)),
        }
    }

    /// Start the scan loop, the thermal loop, and the notice/alert
    /// consumers.
    pub fn run(
        &self,
        mut notices_rx: mpsc::Receiver<SamplerNotice>,
        mut alerts_rx: mpsc::Receiver<CaptureAlert>,
        cancel: CancellationToken,
    ) {
        // Health scan
        let this = self.clone();
        let scan_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = scan_cancel.cancelled() => break,
                    _ = tokio::time::sleep(this.config.health_period) => {}
                }
                this.run_scan().await;
            }
        });

        // Thermal loop
        let this = self.clone();
        let thermal_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = thermal_cancel.cancelled() => break,
                    _ = tokio::time::sleep(this.config.thermal_period) => {}
                }
                this.thermal_tick().await;
            }
        });

        // Sampler notices
        let this = self.clone();
        let notices_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let notice = tokio::select! {
                    _ = notices_cancel.cancelled() => break,
                    notice = notices_rx.recv() => match notice {
                        Some(n) => n,
                        None => break,
                    },
                };
                this.handle_notice(notice).await;
            }
        });

        // Capture alerts
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let alert = tokio::select! {
                    _ = cancel.cancelled() => break,
                    alert = alerts_rx.recv() => match alert {
                        Some(a) => a,
                        None => break,
                    },
                };
                this.handle_alert(alert);
            }
        });
    }

    pub async fn handle_notice(&self, notice: SamplerNotice) {
        match notice {
            SamplerNotice::BusRecovered { resets } => {
                tracing::info!(resets, "sampler reports bus recovered");
                self.announcer.announce(Announcement::Recovered("sensor bus recovered".into()));
            }
            SamplerNotice::RebootRequested { reason } => {
                // The only in-process path to a reboot besides scan-time
                // sampler-restart exhaustion.
                self.reboot.request_reboot(&reason).await;
            }
        }
    }

    pub fn handle_alert(&self, alert: CaptureAlert) {
        let text = match alert {
            CaptureAlert::SaveFailed { prefix } => format!("video save failed: {prefix}"),
            CaptureAlert::EncoderStalled { .. } => "video recording stalled".to_string(),
            CaptureAlert::TimelapseGap { .. } => "timelapse stopped".to_string(),
        };
        self.announcer.announce(Announcement::Alarm(text));
    }

    /// One pass over the health checklist.
    pub async fn run_scan(&self) -> ScanReport {
        let mut report = ScanReport::default();

        self.check_sampler(&mut report).await;
        self.check_collectors(&mut report);
        self.check_video(&mut report).await;
        self.check_gps(&mut report);
        self.check_disk(&mut report);
        self.check_audio(&mut report).await;
        self.check_timelapse(&mut report).await;

        if !report.recovered.is_empty() {
            self.announcer.announce(Announcement::Recovered(format!(
                "recovered: {}",
                report.recovered.join(", ")
            )));
        }

        // Alarm only on issues persisting across two consecutive scans
        let persistent: Vec<String> = {
            let prev = self.prev_issues.lock();
            report.issues.iter().filter(|i| prev.contains(*i)).cloned().collect()
        };
        if !persistent.is_empty() {
            self.announcer
                .announce(Announcement::Alarm(format!("attention: {}", persistent.join(", "))));
        }
        *self.prev_issues.lock() = report.issues.iter().cloned().collect();

        if !report.issues.is_empty() {
            tracing::warn!(issues = ?report.issues, recovered = ?report.recovered, "health scan");
        } else {
            tracing::debug!("health scan clean");
        }
        report
    }

    async fn check_sampler(&self, report: &mut ScanReport) {
        let Some(sampler) = &self.sampler else {
            return;
        };
        let fresh = sampler
            .last_sample_age()
            .is_some_and(|age| age <= self.config.sampler_period * 3);
        if sampler.is_running() && fresh {
            return;
        }

        report.issues.push("sampler".into());
        tracing::warn!("sampler dead or silent, restarting");
        sampler.stop().await;

        for attempt in 1..=self.config.sampler_restart_attempts {
            match sampler.start().await {
                Ok(()) => {
                    report.recovered.push("sampler".into());
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "sampler restart failed");
                    tokio::time::sleep(self.config.sampler_restart_backoff).await;
                }
            }
        }
        self.reboot.request_reboot("sampler restart attempts exhausted").await;
    }

    fn check_collectors(&self, report: &mut ScanReport) {
        let Some(collectors) = &self.collectors else {
            return;
        };
        let now = self.clock.now();
        let last = collectors.last_polled();
        for class in collectors.classes() {
            let stale = last
                .get(class)
                .is_none_or(|at| now.saturating_duration_since(*at) > self.config.lowrate_max_age);
            if stale {
                tracing::warn!(%class, "low-rate collector silent");
                report.issues.push(format!("collector:{class}"));
            }
        }
        if collectors.ingest_paused() {
            tracing::error!("ingestion paused on storage exhaustion");
            report.issues.push("storage:ingest_paused".into());
        }
    }

    async fn check_video(&self, report: &mut ScanReport) {
        if !self.video.is_running().await {
            report.issues.push("encoder".into());
            tracing::warn!("encoder process not running");
            if self.video.restart_encoder("encoder not running").await.is_ok() {
                report.recovered.push("encoder".into());
            }
            return;
        }
        if let Some(stall) = self.video.check_stall().await {
            report.issues.push("encoder".into());
            tracing::warn!(
                output_age_s = stall.output_age.as_secs(),
                threshold_s = stall.threshold.as_secs(),
                "encoder stalled"
            );
            self.announcer.announce(Announcement::Alarm("video recording stalled".into()));
            if self.video.restart_encoder("segment output stalled").await.is_ok() {
                report.recovered.push("encoder".into());
            }
        }
    }

    /// GPS is degraded-not-fatal: an issue, never a recovery action.
    fn check_gps(&self, report: &mut ScanReport) {
        let position_expected = self
            .collectors
            .as_ref()
            .is_some_and(|c| c.classes().contains(&jalopy_core::SensorClass::Position));
        if !position_expected {
            return;
        }
        let fresh = self.status.snapshot().last_fix.is_some_and(|fix| {
            let age_ms = self.clock.epoch_ms().saturating_sub(fix.ts_ms);
            Duration::from_millis(age_ms) <= self.config.gps_max_age
        });
        if !fresh {
            tracing::warn!("gps fix stale");
            report.issues.push("gps".into());
        }
    }

    fn check_disk(&self, report: &mut ScanReport) {
        let Some(pct) = self.disk.used_pct(&self.config.disk_path) else {
            return;
        };
        if pct >= self.config.disk_critical_pct {
            // Retention deletion is deliberately not attempted here
            tracing::error!(pct, "disk critically full");
            report.issues.push("disk".into());
        } else if pct >= self.config.disk_warn_pct {
            tracing::warn!(pct, "disk filling");
        }
    }

    async fn check_audio(&self, report: &mut ScanReport) {
        // Only resuscitate a subsystem that ever came up; a box with no
        // audio hardware stays silent forever.
        if !self.announcer.ever_initialized() || self.announcer.is_alive() {
            return;
        }
        report.issues.push("audio".into());
        tracing::warn!("audio worker dead, reinitializing");
        self.announcer.cleanup().await;
        match self.announcer.init().await {
            Ok(()) => report.recovered.push("audio".into()),
            Err(e) => tracing::warn!(error = %e, "audio reinit failed"),
        }
    }

    async fn check_timelapse(&self, report: &mut ScanReport) {
        let Some(timelapse) = &self.timelapse else {
            return;
        };
        if timelapse.check_gap().is_none() {
            return;
        }
        // check_gap already logged and reset last_capture
        report.issues.push("timelapse".into());
        if self.video.restart_encoder("timelapse gap").await.is_ok() {
            report.recovered.push("timelapse".into());
        }
    }

    /// 5-second thermal tick: publish temperature, edge-triggered
    /// alerts on warn and throttle crossings.
    pub async fn thermal_tick(&self) {
        let temp_c = match self.thermal.read_temp_c().await {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(error = %e, "thermal read failed");
                return;
            }
        };
        self.status.publish_cpu_temp(temp_c);

        let zone = if temp_c >= self.config.thermal_throttle_c {
            ThermalZone::Throttle
        } else if temp_c >= self.config.thermal_warn_c {
            ThermalZone::Warn
        } else {
            ThermalZone::Normal
        };

        let prev = {
            let mut current = self.thermal_zone.lock();
            std::mem::replace(&mut *current, zone)
        };
        if zone == prev {
            return;
        }

        match zone {
            ThermalZone::Throttle => {
                tracing::warn!(temp_c, "cpu reached throttle threshold");
                self.status.set_throttle_bit(THROTTLE_SOFT_TEMP);
                self.announcer.announce(Announcement::Alarm("cpu throttling".into()));
            }
            ThermalZone::Warn => {
                self.status.clear_throttle_bit(THROTTLE_SOFT_TEMP);
                if prev < ThermalZone::Warn {
                    tracing::warn!(temp_c, "cpu temperature high");
                    self.announcer.announce(Announcement::Alarm("cpu temperature high".into()));
                }
            }
            ThermalZone::Normal => {
                self.status.clear_throttle_bit(THROTTLE_SOFT_TEMP);
                tracing::info!(temp_c, "cpu temperature back to normal");
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
