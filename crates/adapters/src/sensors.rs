// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Low-rate sensor seam.
//!
//! One adapter per sensor class (environment, power, position). Concrete
//! drivers are wired at boot; the collectors poll whatever is registered
//! for the enabled classes.

use async_trait::async_trait;
use jalopy_core::{Reading, SensorClass};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    Read(String),
    #[error("sensor read timed out")]
    Timeout,
}

/// A pollable low-rate sensor
#[async_trait]
pub trait SensorAdapter: Send + Sync + 'static {
    fn class(&self) -> SensorClass;

    /// Take one reading. Bounded by the driver's own timeout.
    async fn poll(&self) -> Result<Reading, SensorError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Reading, SensorAdapter, SensorClass, SensorError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakeSensorState {
        next: Option<Reading>,
        fail: bool,
        polls: usize,
    }

    /// Fake sensor returning a configurable reading
    #[derive(Clone)]
    pub struct FakeSensor {
        class: SensorClass,
        inner: Arc<Mutex<FakeSensorState>>,
    }

    impl FakeSensor {
        pub fn new(class: SensorClass) -> Self {
            Self {
                class,
                inner: Arc::new(Mutex::new(FakeSensorState {
                    next: None,
                    fail: false,
                    polls: 0,
                })),
            }
        }

        pub fn set_reading(&self, reading: Reading) {
            self.inner.lock().next = Some(reading);
        }

        pub fn set_failing(&self, fail: bool) {
            self.inner.lock().fail = fail;
        }

        pub fn polls(&self) -> usize {
            self.inner.lock().polls
        }
    }

    #[async_trait]
    impl SensorAdapter for FakeSensor {
        fn class(&self) -> SensorClass {
            self.class
        }

        async fn poll(&self) -> Result<Reading, SensorError> {
            let mut state = self.inner.lock();
            state.polls += 1;
            if state.fail {
                return Err(SensorError::Read("fake failure".into()));
            }
            Ok(state
                .next
                .clone()
                .unwrap_or_else(|| Reading::new(self.class, 0).with_value("value", 0.0)))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSensor;
