// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use yare::parameterized;

#[parameterized(
    plain = { "seg_000001.ts", Some(1) },
    large = { "seg_123456.ts", Some(123_456) },
    wrong_prefix = { "clip_000001.ts", None },
    wrong_suffix = { "seg_000001.mp4", None },
    not_numeric = { "seg_00a001.ts", None },
    empty_digits = { "seg_.ts", None },
)]
fn parse_index_cases(name: &str, expected: Option<u64>) {
    assert_eq!(parse_index(name), expected);
}

#[test]
fn scan_filters_small_and_foreign_files_and_sorts() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("seg_000003.ts"), vec![0u8; 2_000]).unwrap();
    std::fs::write(dir.path().join("seg_000001.ts"), vec![0u8; 2_000]).unwrap();
    std::fs::write(dir.path().join("seg_000002.ts"), vec![0u8; 10]).unwrap(); // runt
    std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

    let segments = scan_segments(dir.path(), 1_000);
    let indices: Vec<u64> = segments.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 3]);
}

#[test]
fn file_count_includes_runts() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("seg_000001.ts"), vec![0u8; 2_000]).unwrap();
    std::fs::write(dir.path().join("seg_000002.ts"), vec![0u8; 1]).unwrap();
    std::fs::write(dir.path().join("other.bin"), b"x").unwrap();

    assert_eq!(segment_file_count(dir.path()), 2);
}

#[test]
fn missing_dir_scans_empty() {
    let dir = tempdir().unwrap();
    let ghost = dir.path().join("nope");
    assert!(scan_segments(&ghost, 1).is_empty());
    assert_eq!(segment_file_count(&ghost), 0);
}

#[test]
fn segment_name_round_trips() {
    assert_eq!(segment_name(42), "seg_000042.ts");
    assert_eq!(parse_index(&segment_name(42)), Some(42));
}
