// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sampler loop and bus-recovery escalation tests.
//!
//! All timing runs under tokio's paused clock, so backoff sleeps
//! complete instantly while preserving order.

use super::*;
use jalopy_adapters::FakeImu;
use jalopy_core::{FakeClock, StatusBoard};

struct Rig {
    imu: FakeImu,
    sampler: Sampler<FakeImu, FakeClock>,
    actions_rx: mpsc::Receiver<DetectorAction>,
    notices_rx: mpsc::Receiver<SamplerNotice>,
}

fn rig(config: SamplerConfig) -> Rig {
    let imu = FakeImu::new();
    let (actions_tx, actions_rx) = mpsc::channel(64);
    let (notices_tx, notices_rx) = mpsc::channel(8);
    let sampler = Sampler::new(
        imu.clone(),
        FakeClock::new(),
        config,
        DetectorConfig::default(),
        StatusBoard::new(),
        actions_tx,
        notices_tx,
    );
    Rig { imu, sampler, actions_rx, notices_rx }
}

/// Let the paused clock advance so the loop can iterate
async fn run_for_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn samples_flow_into_the_ring() {
    let r = rig(SamplerConfig::default());
    r.sampler.start().await.unwrap();
    run_for_ms(200).await;
    r.sampler.stop().await;

    assert!(r.sampler.ring().len() > 10);
    assert!(r.sampler.last_sample_age().is_none(), "age cleared by stop");
}

#[tokio::test(start_paused = true)]
async fn lockup_then_successful_read_recovers_and_resets_budget() {
    let r = rig(SamplerConfig::default());
    r.imu.push_failures(5);
    r.sampler.start().await.unwrap();
    run_for_ms(500).await;

    // One reset attempt, then the script ran out and reads succeeded
    assert_eq!(r.imu.reset_calls(), 1);
    assert_eq!(r.sampler.reset_count(), 0);

    let mut notices_rx = r.notices_rx;
    let notice = notices_rx.recv().await.unwrap();
    assert_eq!(notice, SamplerNotice::BusRecovered { resets: 1 });

    r.sampler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_escalation_requests_reboot_and_stops() {
    let r = rig(SamplerConfig::default());
    // Four full failure windows: attempts 1, 2, 3, then exhaustion
    r.imu.push_failures(20);
    r.sampler.start().await.unwrap();
    run_for_ms(20_000).await;

    assert!(!r.sampler.is_running(), "loop exits after exhaustion");
    assert_eq!(r.imu.reset_calls(), 3, "only budgeted attempts touch the bus");
    assert!(r.sampler.reset_count() > 3);

    let mut notices_rx = r.notices_rx;
    match notices_rx.recv().await.unwrap() {
        SamplerNotice::RebootRequested { reason } => {
            assert!(reason.contains("i2c"), "reason: {reason}");
        }
        other => panic!("expected RebootRequested, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn reboot_requested_iff_reset_budget_exhausted() {
    // One fewer failure window than the budget: no reboot
    let r = rig(SamplerConfig::default());
    r.imu.push_failures(15); // attempts 1..3, then reads succeed
    r.sampler.start().await.unwrap();
    run_for_ms(20_000).await;

    assert!(r.sampler.is_running());
    let mut notices_rx = r.notices_rx;
    let notice = notices_rx.recv().await.unwrap();
    assert_eq!(notice, SamplerNotice::BusRecovered { resets: 3 });
    r.sampler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn boot_locked_bus_recovers_through_init_escalation() {
    let r = rig(SamplerConfig::default());
    r.imu.fail_inits(2);

    r.sampler.start().await.unwrap();

    // init, fail; reset; init, fail; reset; init, ok
    assert_eq!(r.imu.init_calls(), 3);
    assert_eq!(r.imu.reset_calls(), 2);
    assert_eq!(r.sampler.reset_count(), 0);

    let mut notices_rx = r.notices_rx;
    let notice = notices_rx.recv().await.unwrap();
    assert_eq!(notice, SamplerNotice::BusRecovered { resets: 2 });
    r.sampler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn boot_locked_bus_exhaustion_fails_start_without_tight_loop() {
    let r = rig(SamplerConfig::default());
    r.imu.fail_inits(10);

    let err = r.sampler.start().await.unwrap_err();
    assert!(matches!(err, SamplerError::InitExhausted));
    assert!(!r.sampler.is_running());

    let mut notices_rx = r.notices_rx;
    assert!(matches!(
        notices_rx.recv().await.unwrap(),
        SamplerNotice::RebootRequested { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn stop_resets_escalation_budget() {
    let r = rig(SamplerConfig::default());
    r.imu.push_failures(5);
    r.sampler.start().await.unwrap();
    run_for_ms(200).await;
    assert_eq!(r.imu.reset_calls(), 1);

    r.sampler.stop().await;
    assert_eq!(r.sampler.reset_count(), 0);

    // A restart begins a fresh budget
    r.sampler.start().await.unwrap();
    run_for_ms(100).await;
    assert_eq!(r.sampler.reset_count(), 0);
    r.sampler.stop().await;
    let _ = r.actions_rx;
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_a_noop() {
    let r = rig(SamplerConfig::default());
    r.sampler.start().await.unwrap();
    r.sampler.start().await.unwrap();
    assert_eq!(r.imu.init_calls(), 1);
    r.sampler.stop().await;
}
