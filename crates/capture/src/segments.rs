// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Segment enumeration.
//!
//! Segments are `seg_NNNNNN.ts` files. A segment is valid once it
//! reaches the minimum byte count; the highest-numbered file is always
//! treated as in-flight by callers regardless of size.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One media segment on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub path: PathBuf,
    pub index: u64,
    pub mtime: SystemTime,
    pub size: u64,
}

/// Parse `seg_000123.ts` → 123
fn parse_index(name: &str) -> Option<u64> {
    let rest = name.strip_prefix("seg_")?;
    let digits = rest.strip_suffix(".ts")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The filename the encoder writes for a given index
pub fn segment_name(index: u64) -> String {
    format!("seg_{index:06}.ts")
}

/// Valid segments in the buffer directory, sorted by index ascending.
/// Filters by size ≥ `min_bytes` and filename pattern.
pub fn scan_segments(dir: &Path, min_bytes: u64) -> Vec<Segment> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut segments: Vec<Segment> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = parse_index(name.to_str()?)?;
            let meta = entry.metadata().ok()?;
            if meta.len() < min_bytes {
                return None;
            }
            Some(Segment {
                path: entry.path(),
                index,
                mtime: meta.modified().ok()?,
                size: meta.len(),
            })
        })
        .collect();

    segments.sort_by_key(|s| s.index);
    segments
}

/// Count of segment-pattern files regardless of size (the boot guard
/// counts the in-flight one too)
pub fn segment_file_count(dir: &Path) -> usize {
    all_segment_files(dir).len()
}

/// Every segment-pattern file with its index, runts included, sorted by
/// index. Retention and in-flight detection work on this set.
pub(crate) fn all_segment_files(dir: &Path) -> Vec<(u64, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<(u64, PathBuf)> = entries
        .flatten()
        .filter_map(|e| {
            let name = e.file_name();
            let index = parse_index(name.to_str()?)?;
            Some((index, e.path()))
        })
        .collect();
    files.sort_by_key(|(index, _)| *index);
    files
}

#[cfg(test)]
#[path = "segments_tests.rs"]
mod tests;
