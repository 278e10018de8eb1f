// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata codec: the fixed-layout `StoreHeader` and `BlockDescriptor`
//! records, and their binary (de)serialization.
//!
//! Each field is written explicitly with `byteorder` rather than relying
//! on a raw struct memcpy, so the on-disk layout is pinned regardless of
//! host struct padding or endianness.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::layout::{BLOCK_SIZE, NUM_BLOCKS};

/// Size in bytes of an `object_id` field on disk, NUL-terminated.
pub const OBJECT_ID_LEN: usize = 32;
/// Size in bytes of a `file_path` field on disk, NUL-terminated.
pub const FILE_PATH_LEN: usize = 128;

/// Fixed-layout per-store header, written once at the top of `metadata.bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    pub store_id: u32,
    pub total_blocks: u64,
    pub block_size: u64,
    pub used_blocks: u64,
}

impl StoreHeader {
    pub const ENCODED_LEN: usize = 4 + 8 + 8 + 8;

    pub fn fresh(store_id: u32) -> Self {
        Self {
            store_id,
            total_blocks: NUM_BLOCKS as u64,
            block_size: BLOCK_SIZE as u64,
            used_blocks: 0,
        }
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.store_id)?;
        w.write_u64::<LittleEndian>(self.total_blocks)?;
        w.write_u64::<LittleEndian>(self.block_size)?;
        w.write_u64::<LittleEndian>(self.used_blocks)?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            store_id: r.read_u32::<LittleEndian>()?,
            total_blocks: r.read_u64::<LittleEndian>()?,
            block_size: r.read_u64::<LittleEndian>()?,
            used_blocks: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// Fixed-layout per-block descriptor, one per block, following the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub is_used: bool,
    pub object_id: String,
    pub data_size: u64,
    pub timestamp: i64,
    pub file_path: String,
}

impl BlockDescriptor {
    pub const ENCODED_LEN: usize = 1 + OBJECT_ID_LEN + 8 + 8 + FILE_PATH_LEN;

    pub fn empty() -> Self {
        Self {
            is_used: false,
            object_id: String::new(),
            data_size: 0,
            timestamp: 0,
            file_path: String::new(),
        }
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.is_used as u8)?;
        write_fixed_str(w, &self.object_id, OBJECT_ID_LEN)?;
        w.write_u64::<LittleEndian>(self.data_size)?;
        w.write_i64::<LittleEndian>(self.timestamp)?;
        write_fixed_str(w, &self.file_path, FILE_PATH_LEN)?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let is_used = r.read_u8()? != 0;
        let object_id = read_fixed_str(r, OBJECT_ID_LEN)?;
        let data_size = r.read_u64::<LittleEndian>()?;
        let timestamp = r.read_i64::<LittleEndian>()?;
        let file_path = read_fixed_str(r, FILE_PATH_LEN)?;
        Ok(Self {
            is_used,
            object_id,
            data_size,
            timestamp,
            file_path,
        })
    }
}

fn write_fixed_str<W: Write>(w: &mut W, s: &str, width: usize) -> io::Result<()> {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width - 1);
    let mut buf = vec![0u8; width];
    buf[..n].copy_from_slice(&bytes[..n]);
    w.write_all(&buf)
}

fn read_fixed_str<R: Read>(r: &mut R, width: usize) -> io::Result<String> {
    let mut buf = vec![0u8; width];
    r.read_exact(&mut buf)?;
    let nul = buf.iter().position(|&b| b == 0).unwrap_or(width);
    Ok(String::from_utf8_lossy(&buf[..nul]).into_owned())
}

/// Writes the header followed by exactly `NUM_BLOCKS` descriptors, flushing
/// and fsyncing before returning.
pub fn write_header_and_table(
    path: &Path,
    header: &StoreHeader,
    descriptors: &[BlockDescriptor],
) -> Result<()> {
    assert_eq!(descriptors.len(), NUM_BLOCKS, "descriptor table must be exactly NUM_BLOCKS long");
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut w = BufWriter::new(file);
    header.write_to(&mut w)?;
    for d in descriptors {
        d.write_to(&mut w)?;
    }
    w.flush()?;
    w.get_ref().sync_all()?;
    Ok(())
}

/// Reads the header and the full descriptor table back out.
pub fn read_header_and_table(path: &Path) -> Result<(StoreHeader, Vec<BlockDescriptor>)> {
    let expected_len = StoreHeader::ENCODED_LEN + NUM_BLOCKS * BlockDescriptor::ENCODED_LEN;
    let metadata = std::fs::metadata(path)?;
    if (metadata.len() as usize) < expected_len {
        return Err(Error::CorruptMetadata(format!(
            "metadata file {} is {} bytes, expected at least {}",
            path.display(),
            metadata.len(),
            expected_len
        )));
    }

    let file = File::open(path)?;
    let mut r = BufReader::new(file);
    let header = StoreHeader::read_from(&mut r)?;
    let mut descriptors = Vec::with_capacity(NUM_BLOCKS);
    for _ in 0..NUM_BLOCKS {
        descriptors.push(BlockDescriptor::read_from(&mut r)?);
    }
    Ok((header, descriptors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.bin");

        let header = StoreHeader::fresh(20);
        let mut descriptors = vec![BlockDescriptor::empty(); NUM_BLOCKS];
        descriptors[3] = BlockDescriptor {
            is_used: true,
            object_id: "1700000000000_4242".to_string(),
            data_size: 5,
            timestamp: 1_700_000_000,
            file_path: "/t/a.txt".to_string(),
        };

        write_header_and_table(&path, &header, &descriptors).unwrap();
        let (read_header, read_descriptors) = read_header_and_table(&path).unwrap();

        assert_eq!(read_header, header);
        assert_eq!(read_descriptors.len(), NUM_BLOCKS);
        assert_eq!(read_descriptors[3], descriptors[3]);
        assert!(!read_descriptors[0].is_used);
    }

    #[test]
    fn rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.bin");
        std::fs::write(&path, b"too short").unwrap();
        assert!(matches!(
            read_header_and_table(&path),
            Err(Error::CorruptMetadata(_))
        ));
    }

    #[test]
    fn fixed_str_truncates_and_nul_terminates() {
        let mut buf = Vec::new();
        let long = "x".repeat(FILE_PATH_LEN + 10);
        write_fixed_str(&mut buf, &long, FILE_PATH_LEN).unwrap();
        assert_eq!(buf.len(), FILE_PATH_LEN);
        let read_back = read_fixed_str(&mut &buf[..], FILE_PATH_LEN).unwrap();
        assert_eq!(read_back.len(), FILE_PATH_LEN - 1);
    }
}
