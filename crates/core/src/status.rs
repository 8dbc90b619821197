// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide status board.
//!
//! A snapshot of rapidly-changing, read-mostly values. Components publish
//! their own fields; the supervisor and the overlay/indicator consumers
//! copy the whole snapshot out under a short lock.

use parking_lot::Mutex;
use std::sync::Arc;

/// Thermal soft-throttle engaged
pub const THROTTLE_SOFT_TEMP: u32 = 1 << 0;
/// Supply under-voltage observed
pub const THROTTLE_UNDERVOLT: u32 = 1 << 1;

/// Most recent GPS fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub ts_ms: u64,
    pub lat: f64,
    pub lon: f64,
    pub speed_kph: f64,
    pub heading_deg: f64,
}

/// Current values published by the capture and sensor components
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub speed_kph: Option<f64>,
    pub heading_deg: Option<f64>,
    pub cpu_temp_c: Option<f64>,
    pub last_fix: Option<GpsFix>,
    pub throttle_bits: u32,
    pub accel_magnitude_g: Option<f64>,
}

/// Shared handle to the status board. Cheap to clone; all access is a
/// short critical section with no I/O under the lock.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().clone()
    }

    pub fn publish_fix(&self, fix: GpsFix) {
        let mut s = self.inner.lock();
        s.speed_kph = Some(fix.speed_kph);
        s.heading_deg = Some(fix.heading_deg);
        s.last_fix = Some(fix);
    }

    pub fn publish_cpu_temp(&self, temp_c: f64) {
        self.inner.lock().cpu_temp_c = Some(temp_c);
    }

    pub fn publish_accel_magnitude(&self, g: f64) {
        self.inner.lock().accel_magnitude_g = Some(g);
    }

    pub fn set_throttle_bit(&self, bit: u32) {
        self.inner.lock().throttle_bits |= bit;
    }

    pub fn clear_throttle_bit(&self, bit: u32) {
        self.inner.lock().throttle_bits &= !bit;
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
