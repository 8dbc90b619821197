// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Batch uplink to the remote metrics sink and file server.
//!
//! The store buffers; the uplink drains it by cursor when connectivity
//! is up, advancing only on acknowledged delivery. Out-of-window
//! rejections drop the offending rows (counted) rather than wedging the
//! cursor. Saved clips and sidecars ride along via one-way file
//! reconciliation.

pub mod probe;
pub mod push;
pub mod wire;

pub use probe::Probe;
pub use push::{Uplink, UplinkConfig, UplinkStats};
pub use wire::encode_batch;
