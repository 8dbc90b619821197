// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detected and user-triggered incidents.
//!
//! An event is created open when the detector (or a manual/boot trigger)
//! fires, and closed with an end timestamp and accumulated peaks. Events
//! left open across a crash are closed at boot with `interrupted = true`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Event classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HardBrake,
    BigCorner,
    HighG,
    RoughRoad,
    Manual,
    Boot,
}

impl EventKind {
    /// Kinds produced by the inertial detector state machine.
    pub const DETECTED: [EventKind; 4] = [
        EventKind::HardBrake,
        EventKind::BigCorner,
        EventKind::HighG,
        EventKind::RoughRoad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::HardBrake => "hard_brake",
            EventKind::BigCorner => "big_corner",
            EventKind::HighG => "high_g",
            EventKind::RoughRoad => "rough_road",
            EventKind::Manual => "manual",
            EventKind::Boot => "boot",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Peak acceleration magnitudes accumulated while an event is open
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Peaks {
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}

impl Peaks {
    /// Fold a sample in, keeping the largest magnitude per axis.
    pub fn absorb(&mut self, ax: f64, ay: f64, az: f64) {
        if ax.abs() > self.ax.abs() {
            self.ax = ax;
        }
        if ay.abs() > self.ay.abs() {
            self.ay = ay;
        }
        if az.abs() > self.az.abs() {
            self.az = az;
        }
    }
}

/// One detected or externally triggered incident. Owned by the store;
/// `id` is store-assigned and monotonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: u64,
    pub kind: EventKind,
    pub started_at_ms: u64,
    /// None while the event is open
    pub ended_at_ms: Option<u64>,
    #[serde(default)]
    pub peaks: Peaks,
    #[serde(default)]
    pub interrupted: bool,
    /// Saved clip path, attached after a successful video save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
}

impl TelemetryEvent {
    pub fn is_open(&self) -> bool {
        self.ended_at_ms.is_none()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
