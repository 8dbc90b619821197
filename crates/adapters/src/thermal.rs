// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CPU thermal zone probe

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThermalError {
    #[error("thermal zone read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("thermal zone value unparseable: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ThermalProbe: Clone + Send + Sync + 'static {
    async fn read_temp_c(&self) -> Result<f64, ThermalError>;
}

/// Reads millidegrees from the kernel thermal zone
#[derive(Clone, Debug)]
pub struct SysfsThermal {
    zone_path: PathBuf,
}

impl SysfsThermal {
    pub fn new(zone_path: PathBuf) -> Self {
        Self { zone_path }
    }
}

impl Default for SysfsThermal {
    fn default() -> Self {
        Self::new(PathBuf::from("/sys/class/thermal/thermal_zone0/temp"))
    }
}

#[async_trait]
impl ThermalProbe for SysfsThermal {
    async fn read_temp_c(&self) -> Result<f64, ThermalError> {
        let raw = tokio::fs::read_to_string(&self.zone_path).await?;
        let millideg: i64 =
            raw.trim().parse().map_err(|_| ThermalError::Parse(raw.trim().to_string()))?;
        Ok(millideg as f64 / 1000.0)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ThermalError, ThermalProbe};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake probe with a settable temperature
    #[derive(Clone, Default)]
    pub struct FakeThermal {
        temp_c: Arc<Mutex<f64>>,
    }

    impl FakeThermal {
        pub fn new(temp_c: f64) -> Self {
            Self { temp_c: Arc::new(Mutex::new(temp_c)) }
        }

        pub fn set(&self, temp_c: f64) {
            *self.temp_c.lock() = temp_c;
        }
    }

    #[async_trait]
    impl ThermalProbe for FakeThermal {
        async fn read_temp_c(&self) -> Result<f64, ThermalError> {
            Ok(*self.temp_c.lock())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeThermal;
