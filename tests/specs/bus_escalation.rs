// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! I²C escalation: lockup windows consume reset attempts with growing
//! backoff; exhaustion requests a reboot; a successful read anywhere
//! before that clears the budget with an audible recovery.

use jalopy_core::{FakeClock, StatusBoard};
use jalopy_sampler::{DetectorConfig, Sampler, SamplerConfig, SamplerNotice};
use std::time::Duration;
use tokio::sync::mpsc;

struct Rig {
    imu: jalopy_adapters::FakeImu,
    sampler: Sampler<jalopy_adapters::FakeImu, FakeClock>,
    notices_rx: mpsc::Receiver<SamplerNotice>,
}

fn rig() -> Rig {
    let imu = jalopy_adapters::FakeImu::new();
    let (actions_tx, _actions_rx) = mpsc::channel(64);
    let (notices_tx, notices_rx) = mpsc::channel(8);
    let sampler = Sampler::new(
        imu.clone(),
        FakeClock::new(),
        SamplerConfig::default(),
        DetectorConfig::default(),
        StatusBoard::new(),
        actions_tx,
        notices_tx,
    );
    Rig { imu, sampler, notices_rx }
}

#[tokio::test(start_paused = true)]
async fn four_lockup_windows_exhaust_and_request_reboot() {
    let mut r = rig();
    // 5 failures per lockup window; windows 1-3 spend the reset budget
    // (backoffs 0 s, 2 s, 5 s), window 4 exceeds it.
    r.imu.push_failures(20);

    r.sampler.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(r.imu.reset_calls(), 3);
    assert!(!r.sampler.is_running(), "sampler loop ends after exhaustion");
    assert!(matches!(
        r.notices_rx.recv().await.unwrap(),
        SamplerNotice::RebootRequested { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn recovery_before_exhaustion_resets_the_budget_audibly() {
    let mut r = rig();
    // Two lockup windows, then the bus comes back
    r.imu.push_failures(10);

    r.sampler.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(r.notices_rx.recv().await.unwrap(), SamplerNotice::BusRecovered { resets: 2 });
    assert_eq!(r.sampler.reset_count(), 0);
    assert!(r.sampler.is_running());

    // A fresh lockup later starts a new escalation from attempt 1
    r.imu.push_failures(5);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(r.notices_rx.recv().await.unwrap(), SamplerNotice::BusRecovered { resets: 1 });

    r.sampler.stop().await;
}
