// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapter seams for the daemon's external collaborators.
//!
//! Each peripheral or remote service the core consumes is reached
//! through a trait defined here: the IMU bus, low-rate sensors, the CPU
//! thermal zone, the audio synthesizer, the media encoder pipeline, the
//! remote metrics sink, the remote file server, and the reboot path.
//! Production implementations live alongside; Fakes are exported behind
//! the `test-support` feature.

pub mod audio;
pub mod filesync;
pub mod imu;
pub mod pipeline;
pub mod reboot;
pub mod sensors;
pub mod sink;
pub mod subprocess;
pub mod thermal;

pub use audio::{AudioError, AudioSynth, ProcessAudioSynth, TonePattern};
pub use filesync::{FileSync, FileSyncError, RsyncFileSync, SyncStats};
pub use imu::{ImuAdapter, ImuError, NullImu};
pub use pipeline::{EncoderSpec, MediaPipeline, PipelineError, ProcessEncoder};
pub use reboot::{CommandReboot, RebootAdapter};
pub use sensors::{SensorAdapter, SensorError};
pub use sink::{HttpMetricsSink, MetricsSink, SinkError};
pub use subprocess::{run_with_timeout, SubprocessError};
pub use thermal::{SysfsThermal, ThermalError, ThermalProbe};

#[cfg(any(test, feature = "test-support"))]
pub use audio::{FakeAudio, Utterance};
#[cfg(any(test, feature = "test-support"))]
pub use filesync::FakeFileSync;
#[cfg(any(test, feature = "test-support"))]
pub use imu::FakeImu;
#[cfg(any(test, feature = "test-support"))]
pub use pipeline::FakePipeline;
#[cfg(any(test, feature = "test-support"))]
pub use reboot::FakeReboot;
#[cfg(any(test, feature = "test-support"))]
pub use sensors::FakeSensor;
#[cfg(any(test, feature = "test-support"))]
pub use sink::{FakeSink, PushOutcome};
#[cfg(any(test, feature = "test-support"))]
pub use thermal::FakeThermal;
