// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Video ring buffer, clip stitching, and timelapse.
//!
//! The external encoder writes fixed-length numbered segments into the
//! buffer directory; this crate owns its lifecycle, enforces retention,
//! detects stalls, and services point-in-time save requests by stitching
//! pre-roll + post-roll segments into one verified artifact while the
//! recorder keeps running.

pub mod ring;
pub mod segments;
pub mod sidecar;
pub mod timelapse;

pub use ring::{CaptureAlert, CaptureConfig, CaptureError, StallInfo, VideoRing};
pub use segments::{scan_segments, segment_file_count, segment_name, Segment};
pub use sidecar::write_sidecar;
pub use timelapse::{Timelapse, TimelapseConfig};
