// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

const PERIOD_MS: u64 = 10;

fn quiet(ts_ms: u64) -> ImuSample {
    ImuSample { ts_ms, az: 1.0, ..ImuSample::default() }
}

fn braking(ts_ms: u64, ax: f64) -> ImuSample {
    ImuSample { ts_ms, ax, az: 1.0, ..ImuSample::default() }
}

/// Run samples through and collect all actions
fn run(detector: &mut Detector, samples: impl IntoIterator<Item = ImuSample>) -> Vec<DetectorAction> {
    samples.into_iter().flat_map(|s| detector.step(&s)).collect()
}

/// Braking stream from `start` lasting `dur_ms`, then one quiet sample
fn brake_burst(start: u64, dur_ms: u64) -> Vec<ImuSample> {
    let mut out: Vec<ImuSample> =
        (0..dur_ms / PERIOD_MS).map(|i| braking(start + i * PERIOD_MS, -0.5)).collect();
    out.push(quiet(start + dur_ms));
    out
}

#[test]
fn short_spike_never_opens() {
    let mut d = Detector::new(DetectorConfig::default());
    // 100 ms of braking is below the 300 ms hold
    let actions = run(&mut d, brake_burst(0, 100));
    assert!(actions.is_empty());
}

#[test]
fn sustained_braking_opens_then_closes_with_peaks() {
    let mut d = Detector::new(DetectorConfig::default());
    let actions = run(&mut d, brake_burst(0, 400));

    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0], DetectorAction::Open { kind: EventKind::HardBrake, t_start_ms: 0 });
    match &actions[1] {
        DetectorAction::Close { kind, t_end_ms, peaks } => {
            assert_eq!(*kind, EventKind::HardBrake);
            assert_eq!(*t_end_ms, 400);
            assert_eq!(peaks.ax, -0.5);
        }
        other => panic!("expected Close, got {other:?}"),
    }
}

#[test]
fn close_within_suppress_window_extends_prior_event() {
    let config = DetectorConfig::default();
    let mut d = Detector::new(config.clone());

    let mut actions = run(&mut d, brake_burst(0, 400));
    // Drain (1 s) passes, then a second burst starts 3 s after the first
    // close, inside the 10 s suppression window.
    for ts in (410..3_000).step_by(PERIOD_MS as usize) {
        actions.extend(d.step(&quiet(ts)));
    }
    actions.extend(run(&mut d, brake_burst(3_000, 400)));

    let kinds: Vec<&DetectorAction> = actions.iter().collect();
    assert_eq!(kinds.len(), 3);
    assert!(matches!(kinds[0], DetectorAction::Open { .. }));
    assert!(matches!(kinds[1], DetectorAction::Close { .. }));
    match kinds[2] {
        DetectorAction::Extend { kind, t_end_ms, .. } => {
            assert_eq!(*kind, EventKind::HardBrake);
            assert_eq!(*t_end_ms, 3_400);
        }
        other => panic!("expected Extend, got {other:?}"),
    }
}

#[test]
fn burst_after_suppress_window_is_a_new_event() {
    let mut d = Detector::new(DetectorConfig::default());

    let mut actions = run(&mut d, brake_burst(0, 400));
    for ts in (410..15_000).step_by(PERIOD_MS as usize) {
        actions.extend(d.step(&quiet(ts)));
    }
    actions.extend(run(&mut d, brake_burst(15_000, 400)));

    let opens = actions.iter().filter(|a| matches!(a, DetectorAction::Open { .. })).count();
    let closes = actions.iter().filter(|a| matches!(a, DetectorAction::Close { .. })).count();
    assert_eq!(opens, 2);
    assert_eq!(closes, 2);
}

#[test]
fn drain_blocks_immediate_reopen() {
    let config = DetectorConfig { suppress_ms: 0, ..DetectorConfig::default() };
    let mut d = Detector::new(config);

    let mut actions = run(&mut d, brake_burst(0, 400));
    // Condition returns 200 ms after close, inside the 1 s drain
    actions.extend(run(&mut d, brake_burst(600, 400)));

    // Drain swallowed the second burst entirely
    assert_eq!(actions.len(), 2);
}

#[test]
fn different_kinds_open_concurrently() {
    let mut d = Detector::new(DetectorConfig::default());
    // Brake and corner at once for 500 ms
    let samples: Vec<ImuSample> = (0..50)
        .map(|i| ImuSample {
            ts_ms: i * PERIOD_MS,
            ax: -0.5,
            ay: 0.7,
            az: 1.0,
            ..ImuSample::default()
        })
        .chain(std::iter::once(quiet(500)))
        .collect();
    let actions = run(&mut d, samples);

    let opened: Vec<EventKind> = actions
        .iter()
        .filter_map(|a| match a {
            DetectorAction::Open { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert!(opened.contains(&EventKind::HardBrake));
    assert!(opened.contains(&EventKind::BigCorner));
}

#[test]
fn rough_road_triggers_on_vertical_stddev() {
    let mut d = Detector::new(DetectorConfig::default());
    // Alternate az between 0.4 and 1.6: stddev 0.6 over the window
    let mut samples: Vec<ImuSample> = (0..250)
        .map(|i| ImuSample {
            ts_ms: i * PERIOD_MS,
            az: if i % 2 == 0 { 0.4 } else { 1.6 },
            ..ImuSample::default()
        })
        .collect();
    // Settle: constant az long enough to flush the window and close
    samples.extend((250..500).map(|i| quiet(i * PERIOD_MS)));

    let actions = run(&mut d, samples);
    let opens = actions
        .iter()
        .filter(|a| matches!(a, DetectorAction::Open { kind: EventKind::RoughRoad, .. }))
        .count();
    assert_eq!(opens, 1);
}

#[test]
fn high_g_uses_vector_magnitude() {
    let mut d = Detector::new(DetectorConfig::default());
    let samples: Vec<ImuSample> = (0..15)
        .map(|i| ImuSample { ts_ms: i * PERIOD_MS, ax: 1.2, ay: 1.2, az: 1.2, ..ImuSample::default() })
        .chain(std::iter::once(quiet(150)))
        .collect();

    let actions = run(&mut d, samples);
    assert!(actions
        .iter()
        .any(|a| matches!(a, DetectorAction::Open { kind: EventKind::HighG, .. })));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Opens and closes stay balanced per kind for arbitrary streams:
    /// every Close/Extend follows an Open/reopen, and at most one
    /// episode per kind is ever outstanding.
    #[test]
    fn open_close_pairs_balance_per_kind(
        axs in proptest::collection::vec(-1.0f64..1.0, 0..400),
    ) {
        let mut d = Detector::new(DetectorConfig::default());
        let mut outstanding: std::collections::HashMap<EventKind, i64> = Default::default();

        for (i, ax) in axs.iter().enumerate() {
            let sample = ImuSample {
                ts_ms: i as u64 * PERIOD_MS,
                ax: *ax,
                az: 1.0,
                ..ImuSample::default()
            };
            for action in d.step(&sample) {
                match action {
                    DetectorAction::Open { kind, .. } => {
                        let n = outstanding.entry(kind).or_default();
                        *n += 1;
                        prop_assert_eq!(*n, 1, "double open for {:?}", kind);
                    }
                    DetectorAction::Close { kind, .. } => {
                        let n = outstanding.entry(kind).or_default();
                        *n -= 1;
                        prop_assert_eq!(*n, 0, "close without open for {:?}", kind);
                    }
                    // Extensions re-close the prior event; no new open
                    DetectorAction::Extend { .. } => {}
                }
            }
        }

        for (kind, n) in outstanding {
            prop_assert!(n == 0 || n == 1, "unbalanced {:?}: {}", kind, n);
        }
    }
}
