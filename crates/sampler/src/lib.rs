// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! High-rate inertial sampling and low-rate sensor aggregation.
//!
//! The sampler reads the IMU on a compensated fixed period, feeds the
//! inertial ring, and drives the event-detector state machine. Bus
//! lockups are recovered with a bounded escalation that ends in a
//! supervised reboot request. Low-rate collectors poll the remaining
//! sensor classes straight into the durable store.

pub mod detector;
pub mod lowrate;
pub mod ring;
pub mod sampler;

pub use detector::{Detector, DetectorAction, DetectorConfig};
pub use lowrate::{spawn_collectors, CollectorHandle, LowRateConfig};
pub use ring::InertialRing;
pub use sampler::{Sampler, SamplerConfig, SamplerError, SamplerNotice};
