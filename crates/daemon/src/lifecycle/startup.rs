// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and wiring.

use super::{Daemon, LifecycleError};
use crate::announcer::Announcer;
use crate::config::Config;
use crate::control::spawn_signal_adapter;
use crate::events::EventWriter;
use crate::supervisor::{StatvfsDisk, Supervisor, SupervisorConfig};
use fs2::FileExt;
use jalopy_adapters::{
    CommandReboot, HttpMetricsSink, NullImu, ProcessAudioSynth, ProcessEncoder, RsyncFileSync,
    SysfsThermal,
};
use jalopy_capture::{Timelapse, VideoRing};
use jalopy_core::{StatusBoard, SystemClock};
use jalopy_sampler::Sampler;
use jalopy_storage::{Store, StorePaths};
use jalopy_uplink::{Probe, Uplink};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Assemble and start every component. Failure here is the only path to
/// a non-zero exit; once this returns Ok the daemon recovers in place.
pub async fn startup(config: Config) -> Result<Daemon, LifecycleError> {
    // 1. Directories
    std::fs::create_dir_all(&config.store.path)?;
    std::fs::create_dir_all(&config.capture.buffer_dir)?;
    std::fs::create_dir_all(&config.capture.output_dir)?;

    // 2. Exclusive lock with PID, before anything stateful. Open without
    // truncating so a losing race does not wipe the winner's PID.
    let lock_path = config.store.path.join("daemon.pid");
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Store: open, then boot reconciliation before any writer runs
    let store = Store::open(&StorePaths::under(&config.store.path))?;
    let report = store.reconcile_on_boot()?;
    if report.unclean_shutdown {
        info!(
            replayed = report.replayed,
            orphans = report.orphans_closed.len(),
            "recovered from unclean shutdown"
        );
    }
    if let Some((from, to)) = report.cursor_clamped {
        warn!(from, to, "sync cursor clamped at boot");
    }

    // 4. Shared plumbing
    let clock = SystemClock;
    let status = StatusBoard::new();
    let cancel = CancellationToken::new();
    let (actions_tx, actions_rx) = mpsc::channel(64);
    let (notices_tx, notices_rx) = mpsc::channel(8);
    let (alerts_tx, alerts_rx) = mpsc::channel(8);
    let (control_tx, control_rx) = mpsc::channel(8);

    // 5. Audio announcer (best-effort; a box without audio stays silent)
    let synth = ProcessAudioSynth::new(
        config.audio.effective_speak_command(),
        config.audio.tone_command.clone(),
    );
    let announcer = Announcer::new(synth);
    if config.audio.enabled {
        if let Err(e) = announcer.init().await {
            warn!(error = %e, "audio init failed, continuing without announcements");
        }
    }

    // 6. Video ring + timelapse
    let encoder = ProcessEncoder::new(config.encoder_spec());
    let video = VideoRing::new(encoder.clone(), config.capture_config(), alerts_tx);
    if config.capture.encoder_command.is_empty() {
        warn!("capture.encoder_command not configured, video ring idle");
    } else {
        video.start().await?;
    }

    let timelapse = if config.capture.still_command.is_empty() {
        None
    } else {
        let timelapse =
            Timelapse::new(encoder.clone(), clock.clone(), config.timelapse_config(), status.clone());
        timelapse.start()?;
        Some(timelapse)
    };

    // 7. Sensor paths: board-specific drivers are linked by the
    // deployment build, not this workspace. The stock daemon records
    // video, events, and uplink without them; dropping the senders
    // closes the action/notice channels cleanly.
    let sampler: Option<Sampler<NullImu, SystemClock>> = None;
    let collectors = None;
    for (class, enabled) in [
        ("inertial", config.sensors.inertial),
        ("environment", config.sensors.environment),
        ("power", config.sensors.power),
        ("position", config.sensors.position),
    ] {
        if enabled {
            warn!(class, "sensor class enabled but no driver is wired into this build");
        }
    }
    drop(actions_tx);
    drop(notices_tx);

    // 9. Event writer consumes detector actions
    let events = EventWriter::new(store.clone(), video.clone(), clock.clone());
    events.spawn(actions_rx, cancel.clone());

    // 10. Uplink
    let uplink = if config.uplink.remote_write_url.is_empty() {
        info!("uplink.remote_write_url not configured, running offline-only");
        None
    } else {
        let sink = HttpMetricsSink::new(
            config.uplink.remote_write_url.clone(),
            Duration::from_secs(config.uplink.request_timeout_s),
        )
        .map_err(|e| LifecycleError::Io(std::io::Error::other(e.to_string())))?;
        let files = RsyncFileSync::new(
            config.uplink.file_sink_spec.clone(),
            config.uplink.ssh_command.clone(),
        );
        let probe = Probe::new(
            config.uplink.connectivity_probe_host.clone(),
            config.uplink.probe_port,
            Duration::from_millis(config.uplink.probe_timeout_ms),
            Duration::from_secs(config.uplink.probe_cache_s),
        );
        let uplink = Uplink::new(store.clone(), sink, files, probe, config.uplink_config());
        uplink.start(cancel.clone());
        Some(uplink)
    };

    // 11. Supervisor
    let supervisor = Supervisor::new(
        sampler,
        collectors,
        video.clone(),
        timelapse.clone(),
        announcer.clone(),
        CommandReboot::default(),
        SysfsThermal::default(),
        StatvfsDisk,
        clock.clone(),
        status.clone(),
        SupervisorConfig {
            health_period: Duration::from_secs(config.supervisor.health_period_s),
            thermal_warn_c: config.supervisor.thermal_warn_c,
            thermal_throttle_c: config.supervisor.thermal_throttle_c,
            thermal_period: Duration::from_secs(config.supervisor.thermal_period_s),
            disk_warn_pct: config.supervisor.disk_warn_pct,
            disk_critical_pct: config.supervisor.disk_critical_pct,
            gps_max_age: Duration::from_secs(config.supervisor.gps_max_age_s),
            lowrate_max_age: Duration::from_secs(config.supervisor.lowrate_max_age_s),
            sampler_restart_attempts: config.supervisor.sampler_restart_attempts,
            sampler_restart_backoff: Duration::from_secs(config.supervisor.sampler_restart_backoff_s),
            disk_path: config.store.path.clone(),
            sampler_period: Duration::from_millis(config.sampler.period_ms),
        },
    );
    supervisor.run(notices_rx, alerts_rx, cancel.clone());

    // 12. Checkpoints bound WAL growth: on the interval, or early when
    // the journal outgrows the size cap.
    let checkpoint_store = store.clone();
    let checkpoint_cancel = cancel.clone();
    let checkpoint_interval = Duration::from_secs(config.store.checkpoint_interval_s.max(1));
    let checkpoint_wal_bytes = config.store.checkpoint_wal_bytes;
    tokio::spawn(async move {
        let poll = std::cmp::min(checkpoint_interval, Duration::from_secs(30));
        let mut last = tokio::time::Instant::now();
        loop {
            tokio::select! {
                _ = checkpoint_cancel.cancelled() => break,
                _ = tokio::time::sleep(poll) => {}
            }
            let due = last.elapsed() >= checkpoint_interval
                || checkpoint_store.wal_bytes() > checkpoint_wal_bytes;
            if !due {
                continue;
            }
            match checkpoint_store.checkpoint() {
                Ok(_) => last = tokio::time::Instant::now(),
                Err(e) => tracing::warn!(error = %e, "periodic checkpoint failed"),
            }
        }
    });

    // 13. OS signals post to the control channel
    spawn_signal_adapter(control_tx, cancel.clone())?;

    // 14. Boot event (video save skipped until the ring has material)
    if let Err(e) = events.boot_capture().await {
        warn!(error = %e, "boot event failed");
    }

    info!("daemon started");

    Ok(Daemon {
        config,
        lock_file,
        lock_path,
        store,
        status,
        cancel,
        control_rx,
        events,
        uplink,
        video,
        timelapse,
        announcer,
    })
}
