// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log.
//!
//! One JSON object per line, each carrying its sequence number. `flush`
//! writes and fsyncs, so an acknowledged append survives an abrupt power
//! cut. A torn final line (the usual power-cut artifact) is tolerated on
//! read; anything worse rotates the damaged file to `.bak` and preserves
//! the valid prefix.

use crate::record::WalRecord;
use crate::snapshot::rotate_bak_path;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One sequenced WAL entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub record: WalRecord,
}

pub struct Wal {
    path: PathBuf,
    file: File,
    /// Serialized lines appended but not yet written to the file
    buffer: Vec<String>,
    write_seq: u64,
}

impl Wal {
    /// Open (or create) the WAL, scanning existing entries to recover the
    /// write sequence. A cleanly-torn tail is dropped; a file with
    /// interior corruption is rotated to `.bak` and rewritten with only
    /// its valid prefix.
    pub fn open(path: &Path, snapshot_seq: u64) -> Result<Self, WalError> {
        let (entries, damaged) = match read_entries(path) {
            Ok(scan) => scan,
            Err(_) => (Vec::new(), true),
        };

        if damaged {
            let bak = rotate_bak_path(path);
            tracing::warn!(path = %path.display(), bak = %bak.display(), "wal damaged, rotating");
            let _ = std::fs::rename(path, &bak);
            // Rewrite the valid prefix so the clean file stands alone
            let mut clean = File::create(path)?;
            for entry in &entries {
                serde_json::to_writer(&mut clean, entry)?;
                clean.write_all(b"\n")?;
            }
            clean.sync_all()?;
        }

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(snapshot_seq);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self { path: path.to_path_buf(), file, buffer: Vec::new(), write_seq })
    }

    /// Largest sequence number ever appended
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Current on-disk size of the log
    pub fn size_bytes(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Append a record, returning its sequence number. The entry is
    /// buffered until [`Wal::flush`].
    pub fn append(&mut self, record: &WalRecord) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let entry = WalEntry { seq, record: record.clone() };
        self.buffer.push(serde_json::to_string(&entry)?);
        self.write_seq = seq;
        Ok(seq)
    }

    /// Write buffered entries and fsync. Durability point: once this
    /// returns, the entries survive power loss.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        for line in self.buffer.drain(..) {
            self.file.write_all(line.as_bytes())?;
            self.file.write_all(b"\n")?;
        }
        self.file.sync_all()?;
        Ok(())
    }

    /// Entries with seq > `after`, in order. Stops at the first
    /// unparseable line rather than erroring; the tail past a tear is
    /// unreachable by design.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let (entries, _) = read_entries(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.seq > after).collect())
    }

    /// Drop entries with seq < `keep_from`, retaining the rest. Used by
    /// the checkpointer after a snapshot covers the prefix.
    pub fn truncate_before(&mut self, keep_from: u64) -> Result<(), WalError> {
        self.flush()?;
        let (entries, _) = read_entries(&self.path)?;
        let keep: Vec<&WalEntry> = entries.iter().filter(|e| e.seq >= keep_from).collect();

        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut f = File::create(&tmp)?;
            for entry in &keep {
                serde_json::to_writer(&mut f, entry)?;
                f.write_all(b"\n")?;
            }
            f.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

/// Scan the file, returning the valid prefix and whether damage beyond a
/// single torn tail line was found.
fn read_entries(path: &Path) -> Result<(Vec<WalEntry>, bool), WalError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), false)),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    let mut damaged = false;
    let reader = BufReader::new(file);
    let mut lines = reader.split(b'\n').peekable();

    while let Some(line) = lines.next() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<WalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(_) => {
                // A bad final line is a torn write; anything earlier is
                // real corruption.
                damaged = lines.peek().is_some();
                break;
            }
        }
    }

    Ok((entries, damaged))
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
