// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! One TOML document loaded once at startup. Every section is a closed
//! record: unknown keys fail the load, missing keys take the documented
//! defaults. Configuration problems are startup-only failures; nothing
//! here is re-read at runtime.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub sampler: SamplerSection,
    pub detector: DetectorSection,
    pub capture: CaptureSection,
    pub store: StoreSection,
    pub uplink: UplinkSection,
    pub supervisor: SupervisorSection,
    pub audio: AudioSection,
    pub sensors: SensorsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SamplerSection {
    pub period_ms: u64,
    pub i2c_address: u16,
    pub accel_range_g: u8,
    pub gyro_range_dps: u16,
    pub consecutive_failure_threshold: u32,
    pub max_resets: u32,
    pub backoff_schedule_s: Vec<u64>,
    /// Pre-event window, in samples
    pub ring_capacity: usize,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            period_ms: 10,
            i2c_address: 0x68,
            accel_range_g: 4,
            gyro_range_dps: 500,
            consecutive_failure_threshold: 5,
            max_resets: 3,
            backoff_schedule_s: vec![0, 2, 5],
            ring_capacity: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DetectorSection {
    pub hard_brake_g: f64,
    pub hard_brake_hold_ms: u64,
    pub big_corner_g: f64,
    pub big_corner_hold_ms: u64,
    pub high_g: f64,
    pub high_g_hold_ms: u64,
    pub rough_road_std_g: f64,
    pub rough_road_hold_ms: u64,
    pub rough_road_window_ms: u64,
    pub drain_ms: u64,
    pub suppress_ms: u64,
}

impl Default for DetectorSection {
    fn default() -> Self {
        let d = jalopy_sampler::DetectorConfig::default();
        Self {
            hard_brake_g: d.hard_brake_g,
            hard_brake_hold_ms: d.hard_brake_hold_ms,
            big_corner_g: d.big_corner_g,
            big_corner_hold_ms: d.big_corner_hold_ms,
            high_g: d.high_g,
            high_g_hold_ms: d.high_g_hold_ms,
            rough_road_std_g: d.rough_road_std_g,
            rough_road_hold_ms: d.rough_road_hold_ms,
            rough_road_window_ms: d.rough_road_window_ms,
            drain_ms: d.drain_ms,
            suppress_ms: d.suppress_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CaptureSection {
    pub segment_seconds: u64,
    pub segment_count: usize,
    pub pre_event_s: u64,
    pub post_event_s: u64,
    pub overlay_enabled: bool,
    pub buffer_dir: PathBuf,
    pub output_dir: PathBuf,
    pub min_segment_bytes: u64,
    pub stall_factor: u32,
    /// Segmenting encoder argv; runs until killed
    pub encoder_command: Vec<String>,
    /// Concat argv with `{list}` and `{output}` placeholders
    pub concat_command: Vec<String>,
    /// Still-capture argv with `{output}`; empty disables the timelapse
    pub still_command: Vec<String>,
    pub timelapse_interval_s: u64,
    pub timelapse_gap_factor: u32,
    pub timelapse_min_speed_kph: f64,
    pub stills_dir: PathBuf,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            segment_seconds: 10,
            segment_count: 5,
            pre_event_s: 20,
            post_event_s: 10,
            overlay_enabled: false,
            buffer_dir: PathBuf::from("/var/lib/jalopy/buffer"),
            output_dir: PathBuf::from("/var/lib/jalopy/clips"),
            min_segment_bytes: 65_536,
            stall_factor: 3,
            encoder_command: Vec::new(),
            concat_command: vec![
                "ffmpeg".into(),
                "-hide_banner".into(),
                "-f".into(),
                "concat".into(),
                "-safe".into(),
                "0".into(),
                "-i".into(),
                "{list}".into(),
                "-c".into(),
                "copy".into(),
                "{output}".into(),
            ],
            still_command: Vec::new(),
            timelapse_interval_s: 60,
            timelapse_gap_factor: 3,
            timelapse_min_speed_kph: 5.0,
            stills_dir: PathBuf::from("/var/lib/jalopy/timelapse"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreSection {
    /// Directory holding the WAL and snapshot
    pub path: PathBuf,
    pub checkpoint_interval_s: u64,
    /// A WAL grown past this checkpoints early
    pub checkpoint_wal_bytes: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/jalopy/store"),
            checkpoint_interval_s: 300,
            checkpoint_wal_bytes: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct UplinkSection {
    /// Empty disables the metrics push
    pub remote_write_url: String,
    /// rsync destination, e.g. `telemetry@files.example.net:clips/`;
    /// empty disables the file sync
    pub file_sink_spec: String,
    pub ssh_command: String,
    pub batch_size: usize,
    pub poll_interval_s: u64,
    pub connectivity_probe_host: String,
    pub probe_port: u16,
    pub probe_timeout_ms: u64,
    pub probe_cache_s: u64,
    pub max_too_old_retries: u32,
    pub request_timeout_s: u64,
}

impl Default for UplinkSection {
    fn default() -> Self {
        Self {
            remote_write_url: String::new(),
            file_sink_spec: String::new(),
            ssh_command: "ssh".into(),
            batch_size: 500,
            poll_interval_s: 60,
            connectivity_probe_host: String::new(),
            probe_port: 443,
            probe_timeout_ms: 2_000,
            probe_cache_s: 30,
            max_too_old_retries: 20,
            request_timeout_s: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SupervisorSection {
    pub health_period_s: u64,
    pub thermal_warn_c: f64,
    pub thermal_throttle_c: f64,
    pub thermal_period_s: u64,
    pub disk_warn_pct: u8,
    pub disk_critical_pct: u8,
    pub gps_max_age_s: u64,
    pub lowrate_max_age_s: u64,
    pub sampler_restart_attempts: u32,
    pub sampler_restart_backoff_s: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            health_period_s: 30,
            thermal_warn_c: 70.0,
            thermal_throttle_c: 80.0,
            thermal_period_s: 5,
            disk_warn_pct: 80,
            disk_critical_pct: 90,
            gps_max_age_s: 30,
            lowrate_max_age_s: 15,
            sampler_restart_attempts: 3,
            sampler_restart_backoff_s: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AudioSection {
    pub enabled: bool,
    /// Speech model voice file; absent means tone patterns only
    pub model_path: Option<PathBuf>,
    pub device_hint: Option<String>,
    /// Speech argv with `{text}`; derived from model_path when empty
    pub speak_command: Vec<String>,
    /// Tone argv with `{pattern}`
    pub tone_command: Vec<String>,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: None,
            device_hint: None,
            speak_command: Vec::new(),
            tone_command: vec![
                "aplay".into(),
                "-q".into(),
                "/usr/share/jalopy/tones/{pattern}.wav".into(),
            ],
        }
    }
}

impl AudioSection {
    /// The speech command to use, deriving a flite invocation from
    /// model_path when none was given explicitly.
    pub fn effective_speak_command(&self) -> Option<Vec<String>> {
        if !self.speak_command.is_empty() {
            return Some(self.speak_command.clone());
        }
        self.model_path.as_ref().map(|model| {
            vec![
                "flite".into(),
                "-voice".into(),
                model.display().to_string(),
                "-t".into(),
                "{text}".into(),
            ]
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SensorsSection {
    pub inertial: bool,
    pub environment: bool,
    pub power: bool,
    pub position: bool,
    pub interval_s: u64,
}

impl Default for SensorsSection {
    fn default() -> Self {
        Self { inertial: true, environment: true, power: true, position: true, interval_s: 1 }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Startup-only validation; never called again at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Invalid(msg));

        if self.sampler.period_ms == 0 {
            return fail("sampler.period_ms must be positive".into());
        }
        if self.sampler.backoff_schedule_s.is_empty() {
            return fail("sampler.backoff_schedule_s must not be empty".into());
        }
        if self.capture.segment_seconds == 0 || self.capture.segment_count == 0 {
            return fail("capture.segment_seconds and segment_count must be positive".into());
        }
        if self.capture.stall_factor == 0 {
            return fail("capture.stall_factor must be positive".into());
        }
        if self.supervisor.disk_warn_pct >= self.supervisor.disk_critical_pct
            || self.supervisor.disk_critical_pct > 100
        {
            return fail("supervisor disk thresholds must satisfy warn < critical <= 100".into());
        }
        if self.supervisor.thermal_warn_c >= self.supervisor.thermal_throttle_c {
            return fail("supervisor.thermal_warn_c must be below thermal_throttle_c".into());
        }
        if !self.uplink.remote_write_url.is_empty() && self.uplink.connectivity_probe_host.is_empty()
        {
            return fail("uplink.connectivity_probe_host required when remote_write_url set".into());
        }
        if self.uplink.batch_size == 0 {
            return fail("uplink.batch_size must be positive".into());
        }
        Ok(())
    }

    pub fn sampler_config(&self) -> jalopy_sampler::SamplerConfig {
        jalopy_sampler::SamplerConfig {
            period: Duration::from_millis(self.sampler.period_ms),
            consecutive_failure_threshold: self.sampler.consecutive_failure_threshold,
            max_resets: self.sampler.max_resets,
            backoff_schedule: self
                .sampler
                .backoff_schedule_s
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            ring_capacity: self.sampler.ring_capacity,
        }
    }

    pub fn detector_config(&self) -> jalopy_sampler::DetectorConfig {
        jalopy_sampler::DetectorConfig {
            hard_brake_g: self.detector.hard_brake_g,
            hard_brake_hold_ms: self.detector.hard_brake_hold_ms,
            big_corner_g: self.detector.big_corner_g,
            big_corner_hold_ms: self.detector.big_corner_hold_ms,
            high_g: self.detector.high_g,
            high_g_hold_ms: self.detector.high_g_hold_ms,
            rough_road_std_g: self.detector.rough_road_std_g,
            rough_road_hold_ms: self.detector.rough_road_hold_ms,
            rough_road_window_ms: self.detector.rough_road_window_ms,
            drain_ms: self.detector.drain_ms,
            suppress_ms: self.detector.suppress_ms,
        }
    }

    pub fn capture_config(&self) -> jalopy_capture::CaptureConfig {
        jalopy_capture::CaptureConfig {
            segment_seconds: self.capture.segment_seconds,
            segment_count: self.capture.segment_count,
            pre_event_s: self.capture.pre_event_s,
            post_event_s: self.capture.post_event_s,
            min_segment_bytes: self.capture.min_segment_bytes,
            stall_factor: self.capture.stall_factor,
            overlay_enabled: self.capture.overlay_enabled,
            buffer_dir: self.capture.buffer_dir.clone(),
            output_dir: self.capture.output_dir.clone(),
        }
    }

    pub fn timelapse_config(&self) -> jalopy_capture::TimelapseConfig {
        jalopy_capture::TimelapseConfig {
            interval: Duration::from_secs(self.capture.timelapse_interval_s),
            gap_factor: self.capture.timelapse_gap_factor,
            min_speed_kph: self.capture.timelapse_min_speed_kph,
            stills_dir: self.capture.stills_dir.clone(),
        }
    }

    pub fn uplink_config(&self) -> jalopy_uplink::UplinkConfig {
        jalopy_uplink::UplinkConfig {
            batch_size: self.uplink.batch_size,
            poll_interval: Duration::from_secs(self.uplink.poll_interval_s),
            max_too_old_retries: self.uplink.max_too_old_retries,
            output_dir: self.capture.output_dir.clone(),
            ..jalopy_uplink::UplinkConfig::default()
        }
    }

    pub fn encoder_spec(&self) -> jalopy_adapters::EncoderSpec {
        jalopy_adapters::EncoderSpec {
            record_command: self.capture.encoder_command.clone(),
            concat_command: self.capture.concat_command.clone(),
            still_command: (!self.capture.still_command.is_empty())
                .then(|| self.capture.still_command.clone()),
            buffer_dir: self.capture.buffer_dir.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
