// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    inertial = { SensorClass::Inertial, "inertial" },
    environment = { SensorClass::Environment, "environment" },
    power = { SensorClass::Power, "power" },
    position = { SensorClass::Position, "position" },
)]
fn class_round_trips_through_serde(class: SensorClass, name: &str) {
    assert_eq!(class.as_str(), name);
    let json = serde_json::to_string(&class).unwrap();
    assert_eq!(json, format!("\"{}\"", name));
    let back: SensorClass = serde_json::from_str(&json).unwrap();
    assert_eq!(back, class);
}

#[test]
fn builder_accumulates_labels_and_values() {
    let r = Reading::new(SensorClass::Power, 1_000)
        .with_label("rail", "5v")
        .with_value("volts", 5.02)
        .with_value("amps", 0.41);

    assert_eq!(r.ts_ms, 1_000);
    assert_eq!(r.labels.get("rail").map(String::as_str), Some("5v"));
    assert_eq!(r.values.len(), 2);
}

#[test]
fn empty_labels_are_omitted_from_json() {
    let r = Reading::new(SensorClass::Environment, 5).with_value("temp_c", 21.5);
    let json = serde_json::to_string(&r).unwrap();
    assert!(!json.contains("labels"));

    let back: Reading = serde_json::from_str(&json).unwrap();
    assert_eq!(back, r);
}
