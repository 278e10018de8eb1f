// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted cache index (`all_caches.caches`), one line per entry in FIFO
//! order. `object_id` and `file_path` are hex-encoded so an embedded space
//! or `|` in a path can never desynchronize a line, the same treatment the
//! write-ahead log gives its own opaque fields.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::entry::CacheEntry;
use crate::error::{Error, Result};

pub const INDEX_FILENAME: &str = "all_caches.caches";

fn to_hex(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for b in s.as_bytes() {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn from_hex(s: &str) -> Result<String> {
    if s.len() % 2 != 0 {
        return Err(Error::Index(format!("odd-length hex field: {s}")));
    }
    let mut bytes = Vec::with_capacity(s.len() / 2);
    let raw = s.as_bytes();
    for chunk in raw.chunks(2) {
        let hi = (chunk[0] as char)
            .to_digit(16)
            .ok_or_else(|| Error::Index(format!("invalid hex digit: {s}")))?;
        let lo = (chunk[1] as char)
            .to_digit(16)
            .ok_or_else(|| Error::Index(format!("invalid hex digit: {s}")))?;
        bytes.push(((hi << 4) | lo) as u8);
    }
    String::from_utf8(bytes).map_err(|e| Error::Index(e.to_string()))
}

fn encode(entry: &CacheEntry) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        entry.store_id,
        to_hex(&entry.object_id),
        to_hex(&entry.file_path),
        entry.is_dirty as u8,
        entry.timestamp
    )
}

fn decode(line: &str) -> Result<CacheEntry> {
    let mut parts = line.split('|');
    let next = |parts: &mut std::str::Split<'_, char>| -> Result<&str> {
        parts
            .next()
            .ok_or_else(|| Error::Index(format!("truncated index line: {line}")))
    };
    let store_id: u32 = next(&mut parts)?
        .parse()
        .map_err(|_| Error::Index(format!("bad store_id: {line}")))?;
    let object_id = from_hex(next(&mut parts)?)?;
    let file_path = from_hex(next(&mut parts)?)?;
    let is_dirty = next(&mut parts)? != "0";
    let timestamp: i64 = next(&mut parts)?
        .parse()
        .map_err(|_| Error::Index(format!("bad timestamp: {line}")))?;
    Ok(CacheEntry {
        store_id,
        object_id,
        file_path,
        is_dirty,
        timestamp,
    })
}

/// Loads the persisted index, in FIFO (insertion) order. Returns an empty
/// list if the index file does not exist yet (fresh cache directory).
pub fn read_index(path: &Path) -> Result<Vec<CacheEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        entries.push(decode(&line)?);
    }
    Ok(entries)
}

/// Rewrites the index file from scratch with the current FIFO order. The
/// index is rewritten wholesale after every insertion/removal rather than
/// incrementally appended, keeping the on-disk order always equal to the
/// in-memory FIFO order.
pub fn write_index(path: &Path, entries: &[CacheEntry]) -> Result<()> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    for entry in entries {
        writeln!(file, "{}", encode(entry))?;
    }
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_entries_with_tricky_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INDEX_FILENAME);
        let entries = vec![
            CacheEntry {
                store_id: 1,
                object_id: "1700000000000_1234".to_string(),
                file_path: "/a dir/with a space.txt".to_string(),
                is_dirty: true,
                timestamp: 1_700_000_000,
            },
            CacheEntry {
                store_id: 2,
                object_id: "1700000000001_5678".to_string(),
                file_path: "".to_string(),
                is_dirty: false,
                timestamp: 1_700_000_001,
            },
        ];
        write_index(&path, &entries).unwrap();
        let read_back = read_index(&path).unwrap();
        assert_eq!(read_back, entries);
    }

    #[test]
    fn missing_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INDEX_FILENAME);
        assert!(read_index(&path).unwrap().is_empty());
    }
}
