// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed sensor readings.
//!
//! A reading is one sample from one sensor class: a wall-clock timestamp,
//! a label map carrying sensor-specific dimensions, and a numeric value
//! map. Readings are immutable once written to the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sensor classes the daemon collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorClass {
    Inertial,
    Environment,
    Power,
    Position,
}

impl SensorClass {
    pub const ALL: [SensorClass; 4] = [
        SensorClass::Inertial,
        SensorClass::Environment,
        SensorClass::Power,
        SensorClass::Position,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorClass::Inertial => "inertial",
            SensorClass::Environment => "environment",
            SensorClass::Power => "power",
            SensorClass::Position => "position",
        }
    }
}

impl fmt::Display for SensorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sample from one sensor class.
///
/// Label and value maps are ordered (`BTreeMap`) so the wire encoding
/// produces a stable label set per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Wall-clock timestamp, UTC, millisecond precision
    pub ts_ms: u64,
    pub class: SensorClass,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub values: BTreeMap<String, f64>,
}

impl Reading {
    pub fn new(class: SensorClass, ts_ms: u64) -> Self {
        Self { ts_ms, class, labels: BTreeMap::new(), values: BTreeMap::new() }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: f64) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
#[path = "reading_tests.rs"]
mod tests;
