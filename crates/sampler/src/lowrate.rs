// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Low-rate sensor collectors.
//!
//! One task per registered sensor class, polling its adapter on a fixed
//! interval and appending readings to the durable store. The position
//! class additionally publishes the latest fix to the status board.
//! Storage exhaustion pauses ingestion rather than spinning on a
//! non-retryable error; the supervisor surfaces it.

use jalopy_adapters::SensorAdapter;
use jalopy_core::{Clock, GpsFix, SensorClass, StatusBoard};
use jalopy_storage::{Store, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct LowRateConfig {
    /// Poll interval per class; classes absent here use the default
    pub intervals: HashMap<SensorClass, Duration>,
    pub default_interval: Duration,
    /// Ceiling on one adapter poll
    pub poll_timeout: Duration,
}

impl Default for LowRateConfig {
    fn default() -> Self {
        Self {
            intervals: HashMap::new(),
            default_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(2),
        }
    }
}

impl LowRateConfig {
    fn interval_for(&self, class: SensorClass) -> Duration {
        self.intervals.get(&class).copied().unwrap_or(self.default_interval)
    }
}

/// Observability handle over the collector tasks
#[derive(Clone)]
pub struct CollectorHandle {
    last_polled: Arc<Mutex<HashMap<SensorClass, Instant>>>,
    ingest_paused: Arc<AtomicBool>,
    classes: Vec<SensorClass>,
}

impl CollectorHandle {
    /// Classes with a running collector
    pub fn classes(&self) -> &[SensorClass] {
        &self.classes
    }

    /// Most recent successful poll per class
    pub fn last_polled(&self) -> HashMap<SensorClass, Instant> {
        self.last_polled.lock().clone()
    }

    /// True once a storage-full error stopped ingestion
    pub fn ingest_paused(&self) -> bool {
        self.ingest_paused.load(Ordering::Relaxed)
    }
}

/// Spawn one collector task per adapter. Tasks exit on cancellation.
pub fn spawn_collectors<C: Clock>(
    store: Store,
    adapters: Vec<Arc<dyn SensorAdapter>>,
    config: LowRateConfig,
    status: StatusBoard,
    clock: C,
    cancel: CancellationToken,
) -> CollectorHandle {
    let last_polled: Arc<Mutex<HashMap<SensorClass, Instant>>> = Arc::default();
    let ingest_paused = Arc::new(AtomicBool::new(false));
    let classes: Vec<SensorClass> = adapters.iter().map(|a| a.class()).collect();

    for adapter in adapters {
        let class = adapter.class();
        let interval = config.interval_for(class);
        let poll_timeout = config.poll_timeout;
        let store = store.clone();
        let status = status.clone();
        let clock = clock.clone();
        let cancel = cancel.clone();
        let last_polled = Arc::clone(&last_polled);
        let ingest_paused = Arc::clone(&ingest_paused);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let polled = tokio::time::timeout(poll_timeout, adapter.poll()).await;
                match polled {
                    Ok(Ok(mut reading)) => {
                        reading.ts_ms = clock.epoch_ms();
                        publish_status(&status, &reading);
                        last_polled.lock().insert(class, clock.now());

                        if ingest_paused.load(Ordering::Relaxed) {
                            continue;
                        }
                        match store.insert_reading(reading) {
                            Ok(_) => {}
                            Err(StoreError::StorageFull) => {
                                tracing::error!(%class, "storage exhausted, pausing ingestion");
                                ingest_paused.store(true, Ordering::Relaxed);
                            }
                            Err(e) => {
                                tracing::warn!(%class, error = %e, "reading insert failed");
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(%class, error = %e, "sensor poll failed");
                    }
                    Err(_) => {
                        tracing::warn!(%class, "sensor poll timed out");
                    }
                }
            }
        });
    }

    CollectorHandle { last_polled, ingest_paused, classes }
}

fn publish_status(status: &StatusBoard, reading: &jalopy_core::Reading) {
    if reading.class != SensorClass::Position {
        return;
    }
    let (Some(lat), Some(lon)) = (reading.values.get("lat"), reading.values.get("lon")) else {
        return;
    };
    status.publish_fix(GpsFix {
        ts_ms: reading.ts_ms,
        lat: *lat,
        lon: *lon,
        speed_kph: reading.values.get("speed_kph").copied().unwrap_or(0.0),
        heading_deg: reading.values.get("heading_deg").copied().unwrap_or(0.0),
    });
}

#[cfg(test)]
#[path = "lowrate_tests.rs"]
mod tests;
