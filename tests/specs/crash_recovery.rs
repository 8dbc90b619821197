// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash mid-event: the daemon dies with an open event and unsynced
//! readings; the next boot closes the event as interrupted and loses
//! nothing.

use jalopy_core::{EventKind, Peaks, Reading, SensorClass};
use jalopy_storage::{Store, StorePaths};
use tempfile::tempdir;

#[test]
fn crash_mid_event_recovers_everything() {
    let dir = tempdir().unwrap();
    let paths = StorePaths::under(dir.path());

    // First life: 100 readings, one open hard-brake, then the power cut
    let event_id = {
        let store = Store::open(&paths).unwrap();
        store.reconcile_on_boot().unwrap();
        for i in 0..100u64 {
            store
                .insert_reading(
                    Reading::new(SensorClass::Environment, 10_000 + i * 100)
                        .with_value("temp_c", 25.0),
                )
                .unwrap();
        }
        store
            .open_event(EventKind::HardBrake, 19_000, Peaks { ax: -0.5, ay: 0.0, az: 1.0 })
            .unwrap()
        // No close, no checkpoint, no shutdown
    };

    // Second life
    let store = Store::open(&paths).unwrap();
    let report = store.reconcile_on_boot().unwrap();

    assert!(report.unclean_shutdown);
    assert!(!report.quarantined, "integrity check passed");
    assert_eq!(report.orphans_closed, vec![event_id]);

    let event = store.event(event_id).unwrap();
    assert!(event.interrupted);
    assert_eq!(event.ended_at_ms, Some(19_001), "start + epsilon without an artifact");
    assert_eq!(event.peaks.ax, -0.5, "open-time peaks preserved");

    // Cursor unchanged; the next batch carries the full backlog
    assert_eq!(store.cursor(), 0);
    let batch = store.read_batch(store.cursor(), 1_000);
    assert_eq!(batch.len(), 100);
    assert_eq!(batch[0].0, 1);
    assert_eq!(batch[99].0, 100);
}

#[test]
fn double_crash_does_not_reclose_or_duplicate() {
    let dir = tempdir().unwrap();
    let paths = StorePaths::under(dir.path());

    let event_id = {
        let store = Store::open(&paths).unwrap();
        store.reconcile_on_boot().unwrap();
        store.open_event(EventKind::HighG, 5_000, Peaks::default()).unwrap()
    };

    // Boot, reconcile, crash again without new writes
    {
        let store = Store::open(&paths).unwrap();
        let report = store.reconcile_on_boot().unwrap();
        assert_eq!(report.orphans_closed, vec![event_id]);
    }

    // Third life: nothing left to repair
    let store = Store::open(&paths).unwrap();
    let report = store.reconcile_on_boot().unwrap();
    assert!(report.orphans_closed.is_empty());
    assert_eq!(store.events().len(), 1);
}
