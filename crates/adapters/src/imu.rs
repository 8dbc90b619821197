// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IMU bus seam.
//!
//! The board-specific driver (I²C register maps, SCL bit-banging) lives
//! outside this workspace; the core consumes it through this trait. The
//! sampler owns the escalation policy; `bus_reset` is the out-of-band
//! recovery primitive: release SDA, clock SCL nine times, reopen the bus,
//! re-initialize the device.

use async_trait::async_trait;
use jalopy_core::ImuSample;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImuError {
    #[error("bus transaction failed: {0}")]
    Bus(String),
    #[error("read timed out")]
    Timeout,
    #[error("no driver wired")]
    Unavailable,
}

/// Inertial measurement unit behind a jitter-prone bus
#[async_trait]
pub trait ImuAdapter: Clone + Send + Sync + 'static {
    /// Configure ranges and sample rate. May be called again after a
    /// bus reset.
    async fn init(&self) -> Result<(), ImuError>;

    /// Read one accel+gyro sample. Bounded by the driver's own timeout.
    async fn read_sample(&self) -> Result<ImuSample, ImuError>;

    /// Out-of-band bus unlock: 9 SCL pulses with SDA released, then
    /// reopen the bus. Does not re-init the device; callers follow up
    /// with [`ImuAdapter::init`].
    async fn bus_reset(&self) -> Result<(), ImuError>;
}

/// Wiring point used when the inertial class is disabled in config.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullImu;

#[async_trait]
impl ImuAdapter for NullImu {
    async fn init(&self) -> Result<(), ImuError> {
        Err(ImuError::Unavailable)
    }

    async fn read_sample(&self) -> Result<ImuSample, ImuError> {
        Err(ImuError::Unavailable)
    }

    async fn bus_reset(&self) -> Result<(), ImuError> {
        Err(ImuError::Unavailable)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ImuAdapter, ImuError, ImuSample};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted step for the fake bus
    #[derive(Debug, Clone)]
    pub enum FakeRead {
        Ok(ImuSample),
        Fail,
    }

    #[derive(Default)]
    struct FakeImuState {
        script: VecDeque<FakeRead>,
        init_calls: usize,
        reset_calls: usize,
        init_fails_remaining: usize,
        reset_fails_remaining: usize,
    }

    /// Fake IMU with a scripted read sequence and call counters
    #[derive(Clone, Default)]
    pub struct FakeImu {
        inner: Arc<Mutex<FakeImuState>>,
    }

    impl FakeImu {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful read of the given sample
        pub fn push_ok(&self, sample: ImuSample) {
            self.inner.lock().script.push_back(FakeRead::Ok(sample));
        }

        /// Queue `n` consecutive read failures
        pub fn push_failures(&self, n: usize) {
            let mut state = self.inner.lock();
            for _ in 0..n {
                state.script.push_back(FakeRead::Fail);
            }
        }

        /// Make the next `n` init calls fail (for at-boot lockup tests)
        pub fn fail_inits(&self, n: usize) {
            self.inner.lock().init_fails_remaining = n;
        }

        /// Make the next `n` bus resets fail
        pub fn fail_resets(&self, n: usize) {
            self.inner.lock().reset_fails_remaining = n;
        }

        pub fn init_calls(&self) -> usize {
            self.inner.lock().init_calls
        }

        pub fn reset_calls(&self) -> usize {
            self.inner.lock().reset_calls
        }
    }

    #[async_trait]
    impl ImuAdapter for FakeImu {
        async fn init(&self) -> Result<(), ImuError> {
            let mut state = self.inner.lock();
            state.init_calls += 1;
            if state.init_fails_remaining > 0 {
                state.init_fails_remaining -= 1;
                return Err(ImuError::Bus("init nack".into()));
            }
            Ok(())
        }

        async fn read_sample(&self) -> Result<ImuSample, ImuError> {
            let mut state = self.inner.lock();
            match state.script.pop_front() {
                Some(FakeRead::Ok(sample)) => Ok(sample),
                Some(FakeRead::Fail) => Err(ImuError::Bus("remote I/O error".into())),
                // Script exhausted: report a quiet, level sample
                None => Ok(ImuSample { az: 1.0, ..ImuSample::default() }),
            }
        }

        async fn bus_reset(&self) -> Result<(), ImuError> {
            let mut state = self.inner.lock();
            state.reset_calls += 1;
            if state.reset_fails_remaining > 0 {
                state.reset_fails_remaining -= 1;
                return Err(ImuError::Bus("bus still held".into()));
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeImu, FakeRead};
