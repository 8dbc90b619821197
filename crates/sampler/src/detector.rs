// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event detection over the inertial stream.
//!
//! One state machine per event kind: IDLE → CANDIDATE → OPEN → DRAIN →
//! IDLE. Entry to CANDIDATE requires the kind's primary signal to exceed
//! its threshold; OPEN requires the condition to persist for the kind's
//! hold time; DRAIN is a hysteresis window during which the same kind is
//! not re-opened. Different kinds may be open concurrently.
//!
//! The machine is pure: `step` consumes samples and returns actions. The
//! caller persists opens before acting on closes, which keeps events
//! durable before any side-effect.

use jalopy_core::{EventKind, ImuSample, Peaks};
use std::collections::VecDeque;

/// Detector thresholds and windows. Units are g and milliseconds.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Longitudinal accel below this opens a hard-brake candidate
    pub hard_brake_g: f64,
    pub hard_brake_hold_ms: u64,
    /// Absolute lateral accel above this opens a big-corner candidate
    pub big_corner_g: f64,
    pub big_corner_hold_ms: u64,
    /// Vector magnitude above this opens a high-g candidate
    pub high_g: f64,
    pub high_g_hold_ms: u64,
    /// Vertical-accel standard deviation over the rough-road window
    pub rough_road_std_g: f64,
    pub rough_road_hold_ms: u64,
    pub rough_road_window_ms: u64,
    /// Hysteresis after close during which the kind stays shut
    pub drain_ms: u64,
    /// A same-kind close within this of the prior close extends the
    /// prior event instead of emitting a new one
    pub suppress_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hard_brake_g: -0.35,
            hard_brake_hold_ms: 300,
            big_corner_g: 0.5,
            big_corner_hold_ms: 400,
            high_g: 1.8,
            high_g_hold_ms: 100,
            rough_road_std_g: 0.25,
            rough_road_hold_ms: 1_000,
            rough_road_window_ms: 1_000,
            drain_ms: 1_000,
            suppress_ms: 10_000,
        }
    }
}

/// What the caller should do after a step
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorAction {
    /// Persist a new open event
    Open { kind: EventKind, t_start_ms: u64 },
    /// Close the open event of this kind and kick off its side-effects
    Close { kind: EventKind, t_end_ms: u64, peaks: Peaks },
    /// Extend the previously closed event of this kind: update its end
    /// and merge peaks, but do not emit a new event
    Extend { kind: EventKind, t_end_ms: u64, peaks: Peaks },
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Candidate { since_ms: u64 },
    Open { extension: bool },
    Drain { until_ms: u64 },
}

struct KindMachine {
    kind: EventKind,
    phase: Phase,
    peaks: Peaks,
    last_close_ms: Option<u64>,
}

impl KindMachine {
    fn new(kind: EventKind) -> Self {
        Self { kind, phase: Phase::Idle, peaks: Peaks::default(), last_close_ms: None }
    }

    fn step(
        &mut self,
        condition: bool,
        sample: &ImuSample,
        config: &DetectorConfig,
        out: &mut Vec<DetectorAction>,
    ) {
        let ts = sample.ts_ms;
        match self.phase {
            Phase::Idle => {
                if condition {
                    self.phase = Phase::Candidate { since_ms: ts };
                }
            }
            Phase::Candidate { since_ms } => {
                if !condition {
                    self.phase = Phase::Idle;
                } else if ts.saturating_sub(since_ms) >= hold_ms(self.kind, config) {
                    let extension = self
                        .last_close_ms
                        .is_some_and(|lc| since_ms.saturating_sub(lc) <= config.suppress_ms);
                    self.peaks = Peaks::default();
                    self.peaks.absorb(sample.ax, sample.ay, sample.az);
                    self.phase = Phase::Open { extension };
                    if !extension {
                        out.push(DetectorAction::Open { kind: self.kind, t_start_ms: since_ms });
                    }
                }
            }
            Phase::Open { extension } => {
                self.peaks.absorb(sample.ax, sample.ay, sample.az);
                if !condition {
                    self.last_close_ms = Some(ts);
                    let action = if extension {
                        DetectorAction::Extend { kind: self.kind, t_end_ms: ts, peaks: self.peaks }
                    } else {
                        DetectorAction::Close { kind: self.kind, t_end_ms: ts, peaks: self.peaks }
                    };
                    out.push(action);
                    self.phase = Phase::Drain { until_ms: ts + config.drain_ms };
                }
            }
            Phase::Drain { until_ms } => {
                if ts >= until_ms && !condition {
                    self.phase = Phase::Idle;
                }
            }
        }
    }
}

fn hold_ms(kind: EventKind, config: &DetectorConfig) -> u64 {
    match kind {
        EventKind::HardBrake => config.hard_brake_hold_ms,
        EventKind::BigCorner => config.big_corner_hold_ms,
        EventKind::HighG => config.high_g_hold_ms,
        EventKind::RoughRoad => config.rough_road_hold_ms,
        // Manual and boot events do not pass through the detector
        EventKind::Manual | EventKind::Boot => u64::MAX,
    }
}

/// Sliding-window detector over the inertial stream
pub struct Detector {
    config: DetectorConfig,
    machines: Vec<KindMachine>,
    /// (ts_ms, az) window backing the rough-road stddev
    vertical: VecDeque<(u64, f64)>,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Self {
        let machines = EventKind::DETECTED.iter().map(|k| KindMachine::new(*k)).collect();
        Self { config, machines, vertical: VecDeque::new() }
    }

    /// Feed one sample, returning any actions it triggered.
    pub fn step(&mut self, sample: &ImuSample) -> Vec<DetectorAction> {
        self.vertical.push_back((sample.ts_ms, sample.az));
        let floor = sample.ts_ms.saturating_sub(self.config.rough_road_window_ms);
        while self.vertical.front().is_some_and(|(ts, _)| *ts < floor) {
            self.vertical.pop_front();
        }

        let vertical_std = stddev(self.vertical.iter().map(|(_, az)| *az));
        let mut out = Vec::new();
        for machine in &mut self.machines {
            let condition = match machine.kind {
                EventKind::HardBrake => sample.ax < self.config.hard_brake_g,
                EventKind::BigCorner => sample.ay.abs() > self.config.big_corner_g,
                EventKind::HighG => sample.magnitude() > self.config.high_g,
                EventKind::RoughRoad => {
                    self.vertical.len() >= 2 && vertical_std > self.config.rough_road_std_g
                }
                EventKind::Manual | EventKind::Boot => false,
            };
            machine.step(condition, sample, &self.config, &mut out);
        }
        out
    }
}

fn stddev(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count < 2 {
        return 0.0;
    }
    let n = count as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
