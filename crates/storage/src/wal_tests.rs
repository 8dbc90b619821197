// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jalopy_core::{Reading, SensorClass};
use std::io::Write as _;
use tempfile::tempdir;

fn reading_record(id: u64) -> WalRecord {
    WalRecord::ReadingInserted {
        id,
        reading: Reading::new(SensorClass::Environment, 1_000 + id).with_value("temp_c", 20.0),
    }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let wal = Wal::open(&path, 0).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
}

#[test]
fn append_assigns_sequential_seqs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.append(&reading_record(1)).unwrap(), 1);
    assert_eq!(wal.append(&reading_record(2)).unwrap(), 2);

    wal.flush().unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn open_resumes_seq_from_existing_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&reading_record(1)).unwrap();
        wal.append(&reading_record(2)).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);
    assert_eq!(wal.append(&reading_record(3)).unwrap(), 3);
}

#[test]
fn entries_after_filters_by_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    for id in 1..=3 {
        wal.append(&reading_record(id)).unwrap();
    }
    wal.flush().unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);
}

#[test]
fn truncate_before_drops_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    for id in 1..=3 {
        wal.append(&reading_record(id)).unwrap();
    }
    wal.flush().unwrap();

    wal.truncate_before(2).unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);

    // Appends continue from the preserved write_seq
    assert_eq!(wal.append(&reading_record(4)).unwrap(), 4);
}

#[test]
fn torn_tail_is_dropped_without_rotation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&reading_record(1)).unwrap();
        wal.append(&reading_record(2)).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        // Half a JSON object with no newline: a classic power-cut tear
        f.write_all(b"{\"seq\":3,\"record\":{\"t\":\"cursor_adv").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);
    assert!(!path.with_extension("bak").exists());
}

#[test]
fn interior_corruption_rotates_to_bak_and_preserves_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&reading_record(1)).unwrap();
        wal.append(&reading_record(2)).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"not-valid-json\n").unwrap();
        f.write_all(b"also-garbage\n").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();

    assert_eq!(wal.write_seq(), 2);
    assert!(path.with_extension("bak").exists());

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn fully_corrupt_file_rotates_and_starts_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    std::fs::write(&path, b"\x80\x81\x82\xff\xfe\ngarbage\n").unwrap();

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 0);
    assert!(path.with_extension("bak").exists());
}

#[test]
fn entries_after_stops_at_post_open_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&reading_record(1)).unwrap();
    wal.flush().unwrap();

    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"corrupt-line\n").unwrap();
    }

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 1);
}

#[test]
fn open_with_snapshot_seq_starts_numbering_past_it() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    // Fresh WAL after a checkpoint at seq 40
    let mut wal = Wal::open(&path, 40).unwrap();
    assert_eq!(wal.append(&reading_record(41)).unwrap(), 41);
}
