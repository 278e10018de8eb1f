// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure path-derivation helpers: free functions over a configurable root
//! directory, rather than a struct wrapping it, since every call site just
//! needs a one-shot path and nothing here is stateful.

use std::path::{Path, PathBuf};

/// Fixed block size: 1 MiB.
pub const BLOCK_SIZE: usize = 1024 * 1024;
/// Blocks per store.
pub const NUM_BLOCKS: usize = 1024;

/// Default base directory for stores.
pub const DEFAULT_BASE_PATH: &str = "/tmp/hearty";

const STORE_DIR_PREFIX: &str = "store_";
const DATA_FILENAME: &str = "data.bin";
const META_FILENAME: &str = "metadata.bin";
const LOG_FILENAME: &str = "log.txt";

/// Root directory for a given store id under `base_path`.
pub fn store_dir(base_path: &Path, store_id: u32) -> PathBuf {
    base_path.join(format!("{STORE_DIR_PREFIX}{store_id}"))
}

pub fn data_path(base_path: &Path, store_id: u32) -> PathBuf {
    store_dir(base_path, store_id).join(DATA_FILENAME)
}

pub fn metadata_path(base_path: &Path, store_id: u32) -> PathBuf {
    store_dir(base_path, store_id).join(META_FILENAME)
}

pub fn log_path(base_path: &Path, store_id: u32) -> PathBuf {
    store_dir(base_path, store_id).join(LOG_FILENAME)
}

/// Parses a directory name of the form `store_<digits>` into a store id.
pub fn parse_store_dir_name(name: &str) -> Option<u32> {
    name.strip_prefix(STORE_DIR_PREFIX)?.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_expected_paths() {
        let base = Path::new("/tmp/hearty");
        assert_eq!(store_dir(base, 20), PathBuf::from("/tmp/hearty/store_20"));
        assert_eq!(
            data_path(base, 20),
            PathBuf::from("/tmp/hearty/store_20/data.bin")
        );
        assert_eq!(
            metadata_path(base, 20),
            PathBuf::from("/tmp/hearty/store_20/metadata.bin")
        );
        assert_eq!(
            log_path(base, 20),
            PathBuf::from("/tmp/hearty/store_20/log.txt")
        );
    }

    #[test]
    fn parses_store_dir_names() {
        assert_eq!(parse_store_dir_name("store_42"), Some(42));
        assert_eq!(parse_store_dir_name("store_"), None);
        assert_eq!(parse_store_dir_name("not_a_store"), None);
    }
}
