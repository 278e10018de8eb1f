// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store engine: composes layout, metadata, the allocator, and the WAL
//! into `initialize` / `put` / `get` / `list_stores` / `destroy_store`.
//! One engine type owns the whole lifecycle of a store rather than
//! splitting each operation into its own service struct.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use chrono::Utc;
use md5::{Digest, Md5};

use crate::allocator::{self, Allocation};
use crate::error::{Error, Result};
use crate::layout::{self, BLOCK_SIZE, NUM_BLOCKS};
use crate::metadata::{self, BlockDescriptor, StoreHeader};
use crate::wal::{self, LogRecord};
use crate::id;

/// One store's listing entry, as returned by `list_stores`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub store_id: u32,
    pub used_blocks: u64,
    pub total_blocks: u64,
}

pub struct StoreEngine {
    base_path: PathBuf,
}

impl StoreEngine {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn store_dir(&self, store_id: u32) -> PathBuf {
        layout::store_dir(&self.base_path, store_id)
    }

    fn data_path(&self, store_id: u32) -> PathBuf {
        layout::data_path(&self.base_path, store_id)
    }

    fn metadata_path(&self, store_id: u32) -> PathBuf {
        layout::metadata_path(&self.base_path, store_id)
    }

    fn log_path(&self, store_id: u32) -> PathBuf {
        layout::log_path(&self.base_path, store_id)
    }

    fn store_exists(&self, store_id: u32) -> bool {
        self.store_dir(store_id).is_dir()
    }

    /// Creates a fresh store directory with zeroed metadata and a
    /// sparse, zero-filled `data.bin`. Any failure along the way removes
    /// the partially-created directory tree.
    pub fn initialize(&self, store_id: u32) -> Result<()> {
        if self.store_exists(store_id) {
            return Err(Error::AlreadyExists);
        }
        let dir = self.store_dir(store_id);
        let result = (|| -> Result<()> {
            std::fs::create_dir_all(&dir)?;

            let header = StoreHeader::fresh(store_id);
            let descriptors = vec![BlockDescriptor::empty(); NUM_BLOCKS];
            metadata::write_header_and_table(&self.metadata_path(store_id), &header, &descriptors)?;

            let data_file = File::create(self.data_path(store_id))?;
            data_file.set_len((NUM_BLOCKS * BLOCK_SIZE) as u64)?;
            data_file.sync_all()?;

            Ok(())
        })();

        if result.is_err() {
            let _ = std::fs::remove_dir_all(&dir);
        }
        result
    }

    /// Replays any uncommitted tail of the write-ahead log, restoring the
    /// data and metadata pre-images it carries, then checkpoints the log
    /// back to empty. A no-op (besides the truncate) if the log already
    /// ends with `COMMIT`.
    fn recover(&self, store_id: u32) -> Result<()> {
        let log_path = self.log_path(store_id);
        let records = wal::read_all(&log_path)?;
        let tail = wal::uncommitted_tail(&records);
        if tail.is_empty() {
            wal::truncate(&log_path)?;
            return Ok(());
        }

        tracing::warn!(
            store_id,
            count = tail.len(),
            "rolling back uncommitted WAL records"
        );

        let metadata_path = self.metadata_path(store_id);
        let (mut header, mut descriptors) = metadata::read_header_and_table(&metadata_path)?;
        let mut data_file = OpenOptions::new().write(true).open(self.data_path(store_id))?;

        for record in tail.iter().rev() {
            match record {
                LogRecord::AddEntry { .. } => {
                    // The metadata write that would apply this entry is the
                    // same write that applies its Allocate; restoring
                    // Allocate's `previous` snapshot already undoes it.
                }
                LogRecord::PutFile {
                    block_index,
                    old_block_bytes,
                    ..
                } => {
                    data_file.seek(SeekFrom::Start(*block_index as u64 * BLOCK_SIZE as u64))?;
                    data_file.write_all(old_block_bytes)?;
                }
                LogRecord::Allocate {
                    block_index,
                    previous,
                } => {
                    descriptors[*block_index] = previous.clone();
                }
                LogRecord::Commit => {}
            }
        }
        data_file.flush()?;
        data_file.sync_all()?;

        header.used_blocks = descriptors.iter().filter(|d| d.is_used).count() as u64;
        metadata::write_header_and_table(&metadata_path, &header, &descriptors)?;
        wal::append(&log_path, &LogRecord::Commit)?;
        wal::truncate(&log_path)?;
        Ok(())
    }

    /// Writes `content` under `file_path` in `store_id`, returning the
    /// assigned (or reassigned, on path-reuse) `object_id`.
    pub fn put(&self, store_id: u32, file_path: &str, content: &[u8]) -> Result<String> {
        if content.len() > BLOCK_SIZE {
            return Err(Error::TooLarge { len: content.len() });
        }
        if !self.store_exists(store_id) {
            return Err(Error::NotFound);
        }
        self.recover(store_id)?;

        let metadata_path = self.metadata_path(store_id);
        let (mut header, mut descriptors) = metadata::read_header_and_table(&metadata_path)?;
        let allocation = allocator::allocate(&descriptors, file_path).ok_or(Error::NoCapacity)?;

        self.commit_put(store_id, file_path, content, allocation, &mut header, &mut descriptors)
            .map_err(|e| Error::PutFailed(e.to_string()))
    }

    fn commit_put(
        &self,
        store_id: u32,
        file_path: &str,
        content: &[u8],
        allocation: Allocation,
        header: &mut StoreHeader,
        descriptors: &mut [BlockDescriptor],
    ) -> Result<String> {
        let block_index = allocation.block_index();
        let log_path = self.log_path(store_id);
        let data_path = self.data_path(store_id);
        let previous = descriptors[block_index].clone();

        wal::append(
            &log_path,
            &LogRecord::Allocate {
                block_index,
                previous,
            },
        )?;

        let mut data_file = OpenOptions::new().read(true).write(true).open(&data_path)?;
        let offset = block_index as u64 * BLOCK_SIZE as u64;
        let mut old_block_bytes = vec![0u8; BLOCK_SIZE];
        data_file.seek(SeekFrom::Start(offset))?;
        data_file.read_exact(&mut old_block_bytes)?;

        let mut hasher = Md5::new();
        hasher.update(content);
        let md5_of_new_content = format!("{:x}", hasher.finalize());

        wal::append(
            &log_path,
            &LogRecord::PutFile {
                block_index,
                md5_of_new_content,
                old_block_bytes,
            },
        )?;

        data_file.seek(SeekFrom::Start(offset))?;
        data_file.write_all(content)?;
        data_file.flush()?;
        data_file.sync_all()?;

        let now_millis = Utc::now().timestamp_millis().max(0) as u128;
        let object_id = {
            let existing: Vec<&str> = descriptors
                .iter()
                .filter(|d| d.is_used)
                .map(|d| d.object_id.as_str())
                .collect();
            id::generate_unique(now_millis, |candidate| existing.contains(&candidate))
        };

        wal::append(
            &log_path,
            &LogRecord::AddEntry {
                block_index,
                object_id: object_id.clone(),
                data_size: content.len() as u64,
                file_path: file_path.to_string(),
            },
        )?;

        let was_used = descriptors[block_index].is_used;
        descriptors[block_index] = BlockDescriptor {
            is_used: true,
            object_id: object_id.clone(),
            data_size: content.len() as u64,
            timestamp: Utc::now().timestamp(),
            file_path: file_path.to_string(),
        };
        if !was_used {
            header.used_blocks += 1;
        }

        metadata::write_header_and_table(&self.metadata_path(store_id), header, descriptors)?;
        wal::append(&log_path, &LogRecord::Commit)?;
        wal::truncate(&log_path)?;

        Ok(object_id)
    }

    /// Reads back the bytes stored under `object_id` in `store_id`.
    pub fn get(&self, store_id: u32, object_id: &str) -> Result<Vec<u8>> {
        if !self.store_exists(store_id) {
            return Err(Error::NotFound);
        }
        self.recover(store_id)?;

        let (_header, descriptors) = metadata::read_header_and_table(&self.metadata_path(store_id))?;
        let found = descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.is_used && d.object_id == object_id);

        let (block_index, descriptor) = found.ok_or(Error::NotFound)?;

        let mut data_file = File::open(self.data_path(store_id))?;
        data_file.seek(SeekFrom::Start(block_index as u64 * BLOCK_SIZE as u64))?;
        let mut buf = vec![0u8; descriptor.data_size as usize];
        data_file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Lists every known store, its usage, and its capacity.
    pub fn list_stores(&self) -> Result<Vec<StoreSummary>> {
        if !self.base_path.is_dir() {
            return Ok(Vec::new());
        }
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(store_id) = layout::parse_store_dir_name(name) else {
                continue;
            };
            match metadata::read_header_and_table(&self.metadata_path(store_id)) {
                Ok((header, _)) => summaries.push(StoreSummary {
                    store_id,
                    used_blocks: header.used_blocks,
                    total_blocks: header.total_blocks,
                }),
                Err(e) => tracing::warn!(store_id, error = %e, "skipping unreadable store"),
            }
        }
        summaries.sort_by_key(|s| s.store_id);
        Ok(summaries)
    }

    /// Human-readable rendering of `list_stores`, pre-formatted the way the
    /// `List` RPC response carries it.
    pub fn list_stores_formatted(&self) -> Result<String> {
        let summaries = self.list_stores()?;
        if summaries.is_empty() {
            return Ok("No store found".to_string());
        }
        Ok(summaries
            .iter()
            .map(|s| {
                format!(
                    "{} - active (used: {}/{} blocks)",
                    s.store_id, s.used_blocks, s.total_blocks
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Removes a store's directory tree entirely.
    pub fn destroy_store(&self, store_id: u32) -> Result<()> {
        if !self.store_exists(store_id) {
            return Err(Error::NotFound);
        }
        std::fs::remove_dir_all(self.store_dir(store_id))?;
        Ok(())
    }
}
