// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jalopy_adapters::FakeSensor;
use jalopy_core::{FakeClock, Reading};
use jalopy_storage::StorePaths;
use tempfile::tempdir;

fn open_store(dir: &std::path::Path) -> Store {
    let store = Store::open(&StorePaths::under(dir)).unwrap();
    store.reconcile_on_boot().unwrap();
    store
}

#[tokio::test(start_paused = true)]
async fn collector_inserts_readings_on_interval() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let sensor = FakeSensor::new(SensorClass::Environment);
    sensor.set_reading(Reading::new(SensorClass::Environment, 0).with_value("temp_c", 31.0));

    let cancel = CancellationToken::new();
    let handle = spawn_collectors(
        store.clone(),
        vec![Arc::new(sensor.clone())],
        LowRateConfig::default(),
        StatusBoard::new(),
        FakeClock::new(),
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    cancel.cancel();

    assert!(sensor.polls() >= 3);
    assert!(store.max_reading_id() >= 3);
    assert!(handle.last_polled().contains_key(&SensorClass::Environment));
    assert!(!handle.ingest_paused());
}

#[tokio::test(start_paused = true)]
async fn position_readings_publish_a_fix() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let sensor = FakeSensor::new(SensorClass::Position);
    sensor.set_reading(
        Reading::new(SensorClass::Position, 0)
            .with_value("lat", -37.81)
            .with_value("lon", 144.96)
            .with_value("speed_kph", 72.0)
            .with_value("heading_deg", 90.0),
    );

    let status = StatusBoard::new();
    let cancel = CancellationToken::new();
    let _handle = spawn_collectors(
        store,
        vec![Arc::new(sensor)],
        LowRateConfig::default(),
        status.clone(),
        FakeClock::new(),
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    cancel.cancel();

    let snap = status.snapshot();
    assert_eq!(snap.speed_kph, Some(72.0));
    assert_eq!(snap.last_fix.map(|f| f.lat), Some(-37.81));
}

#[tokio::test(start_paused = true)]
async fn failing_sensor_never_updates_last_polled() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let sensor = FakeSensor::new(SensorClass::Power);
    sensor.set_failing(true);

    let cancel = CancellationToken::new();
    let handle = spawn_collectors(
        store.clone(),
        vec![Arc::new(sensor)],
        LowRateConfig::default(),
        StatusBoard::new(),
        FakeClock::new(),
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    cancel.cancel();

    assert!(handle.last_polled().is_empty());
    assert_eq!(store.max_reading_id(), 0);
}
