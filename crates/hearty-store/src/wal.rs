// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-ahead log. One line per record, tag-prefixed, fields separated by
//! `|`. Binary/opaque fields (`old_block_bytes`, `object_id`, `file_path`)
//! are hex-encoded so an embedded `|`, space, or newline in a
//! client-supplied path can never desynchronize the log.
//!
//! `Allocate` carries the full prior `BlockDescriptor` of the slot it
//! targets (empty, if the slot was free), not just `block_index`. Recovery
//! needs a metadata pre-image exactly the way `PutFile` carries a data
//! pre-image: restoring it is always safe to apply, whether or not the
//! later metadata persist in the owning `put` actually reached disk before
//! the crash, because re-applying an unreached prior state is a no-op.
//!
//! Each record is flushed and fsynced individually as it's appended: the
//! flush is the durability linearization point.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::metadata::BlockDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Allocate {
        block_index: usize,
        previous: BlockDescriptor,
    },
    PutFile {
        block_index: usize,
        md5_of_new_content: String,
        old_block_bytes: Vec<u8>,
    },
    AddEntry {
        block_index: usize,
        object_id: String,
        data_size: u64,
        file_path: String,
    },
    Commit,
}

const TAG_ALLOCATE: u8 = 0;
const TAG_PUT_FILE: u8 = 1;
const TAG_ADD_ENTRY: u8 = 2;
const TAG_COMMIT: u8 = 3;

fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn from_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(Error::WalCorrupt(format!("odd-length hex field: {s}")));
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char)
            .to_digit(16)
            .ok_or_else(|| Error::WalCorrupt(format!("invalid hex digit in {s}")))?;
        let lo = (chunk[1] as char)
            .to_digit(16)
            .ok_or_else(|| Error::WalCorrupt(format!("invalid hex digit in {s}")))?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}

impl LogRecord {
    fn encode(&self) -> String {
        match self {
            LogRecord::Allocate {
                block_index,
                previous,
            } => format!(
                "{TAG_ALLOCATE}|{block_index}|{}|{}|{}|{}|{}",
                previous.is_used as u8,
                to_hex(previous.object_id.as_bytes()),
                previous.data_size,
                previous.timestamp,
                to_hex(previous.file_path.as_bytes())
            ),
            LogRecord::PutFile {
                block_index,
                md5_of_new_content,
                old_block_bytes,
            } => format!(
                "{TAG_PUT_FILE}|{block_index}|{md5_of_new_content}|{}",
                to_hex(old_block_bytes)
            ),
            LogRecord::AddEntry {
                block_index,
                object_id,
                data_size,
                file_path,
            } => format!(
                "{TAG_ADD_ENTRY}|{block_index}|{}|{data_size}|{}",
                to_hex(object_id.as_bytes()),
                to_hex(file_path.as_bytes())
            ),
            LogRecord::Commit => format!("{TAG_COMMIT}"),
        }
    }

    fn decode(line: &str) -> Result<Self> {
        let mut parts = line.split('|');
        let tag: u8 = parts
            .next()
            .ok_or_else(|| Error::WalCorrupt("empty log line".into()))?
            .parse()
            .map_err(|_| Error::WalCorrupt(format!("bad tag in line: {line}")))?;

        let next = |parts: &mut std::str::Split<'_, char>| -> Result<String> {
            parts
                .next()
                .map(|s| s.to_string())
                .ok_or_else(|| Error::WalCorrupt(format!("truncated log line: {line}")))
        };

        match tag {
            TAG_ALLOCATE => {
                let block_index: usize = next(&mut parts)?
                    .parse()
                    .map_err(|_| Error::WalCorrupt(format!("bad block_index: {line}")))?;
                let is_used = next(&mut parts)? != "0";
                let object_id = String::from_utf8(from_hex(&next(&mut parts)?)?)
                    .map_err(|e| Error::WalCorrupt(e.to_string()))?;
                let data_size: u64 = next(&mut parts)?
                    .parse()
                    .map_err(|_| Error::WalCorrupt(format!("bad data_size: {line}")))?;
                let timestamp: i64 = next(&mut parts)?
                    .parse()
                    .map_err(|_| Error::WalCorrupt(format!("bad timestamp: {line}")))?;
                let file_path = String::from_utf8(from_hex(&next(&mut parts)?)?)
                    .map_err(|e| Error::WalCorrupt(e.to_string()))?;
                Ok(LogRecord::Allocate {
                    block_index,
                    previous: BlockDescriptor {
                        is_used,
                        object_id,
                        data_size,
                        timestamp,
                        file_path,
                    },
                })
            }
            TAG_PUT_FILE => {
                let block_index: usize = next(&mut parts)?
                    .parse()
                    .map_err(|_| Error::WalCorrupt(format!("bad block_index: {line}")))?;
                let md5_of_new_content = next(&mut parts)?;
                let old_block_bytes = from_hex(&next(&mut parts)?)?;
                Ok(LogRecord::PutFile {
                    block_index,
                    md5_of_new_content,
                    old_block_bytes,
                })
            }
            TAG_ADD_ENTRY => {
                let block_index: usize = next(&mut parts)?
                    .parse()
                    .map_err(|_| Error::WalCorrupt(format!("bad block_index: {line}")))?;
                let object_id = String::from_utf8(from_hex(&next(&mut parts)?)?)
                    .map_err(|e| Error::WalCorrupt(e.to_string()))?;
                let data_size: u64 = next(&mut parts)?
                    .parse()
                    .map_err(|_| Error::WalCorrupt(format!("bad data_size: {line}")))?;
                let file_path = String::from_utf8(from_hex(&next(&mut parts)?)?)
                    .map_err(|e| Error::WalCorrupt(e.to_string()))?;
                Ok(LogRecord::AddEntry {
                    block_index,
                    object_id,
                    data_size,
                    file_path,
                })
            }
            TAG_COMMIT => Ok(LogRecord::Commit),
            other => Err(Error::WalCorrupt(format!("unknown log tag {other}"))),
        }
    }
}

/// Appends a single record, flushing and fsyncing before returning.
pub fn append(log_path: &Path, record: &LogRecord) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{}", record.encode())?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

/// Reads every record currently in the log, in append order. Returns an
/// empty vector if the log file does not exist yet.
pub fn read_all(log_path: &Path) -> Result<Vec<LogRecord>> {
    if !log_path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(log_path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        records.push(LogRecord::decode(&line)?);
    }
    Ok(records)
}

/// Truncates the log to empty, fsyncing the truncation.
pub fn truncate(log_path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(log_path)?;
    file.sync_all()?;
    Ok(())
}

/// Splits `records` into the uncommitted tail: everything after the last
/// `Commit` (or the whole log, if no `Commit` is present).
pub fn uncommitted_tail(records: &[LogRecord]) -> &[LogRecord] {
    match records.iter().rposition(|r| matches!(r, LogRecord::Commit)) {
        Some(idx) => &records[idx + 1..],
        None => records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_variants() {
        let records = vec![
            LogRecord::Allocate {
                block_index: 3,
                previous: BlockDescriptor::empty(),
            },
            LogRecord::PutFile {
                block_index: 3,
                md5_of_new_content: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
                old_block_bytes: vec![0u8; 1024],
            },
            LogRecord::AddEntry {
                block_index: 3,
                object_id: "1700000000000_4242".to_string(),
                data_size: 5,
                file_path: "/tmp/a|weird path.txt".to_string(),
            },
            LogRecord::Commit,
        ];
        for r in &records {
            let encoded = r.encode();
            let decoded = LogRecord::decode(&encoded).unwrap();
            assert_eq!(&decoded, r);
        }
    }

    #[test]
    fn append_and_read_preserve_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        append(
            &path,
            &LogRecord::Allocate {
                block_index: 1,
                previous: BlockDescriptor::empty(),
            },
        )
        .unwrap();
        append(
            &path,
            &LogRecord::AddEntry {
                block_index: 1,
                object_id: "a".to_string(),
                data_size: 1,
                file_path: "/p".to_string(),
            },
        )
        .unwrap();
        append(&path, &LogRecord::Commit).unwrap();

        let records = read_all(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert!(uncommitted_tail(&records).is_empty());
    }

    #[test]
    fn uncommitted_tail_is_everything_after_last_commit() {
        let records = vec![
            LogRecord::Commit,
            LogRecord::Allocate {
                block_index: 5,
                previous: BlockDescriptor::empty(),
            },
            LogRecord::PutFile {
                block_index: 5,
                md5_of_new_content: "x".to_string(),
                old_block_bytes: vec![],
            },
        ];
        let tail = uncommitted_tail(&records);
        assert_eq!(tail.len(), 2);
    }

    #[test]
    fn uncommitted_tail_is_everything_when_no_commit() {
        let records = vec![LogRecord::Allocate {
            block_index: 0,
            previous: BlockDescriptor::empty(),
        }];
        assert_eq!(uncommitted_tail(&records), &records[..]);
    }

    #[test]
    fn truncate_empties_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        append(&path, &LogRecord::Commit).unwrap();
        truncate(&path).unwrap();
        assert!(read_all(&path).unwrap().is_empty());
    }
}
