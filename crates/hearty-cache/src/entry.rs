// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side cache entry shape.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub store_id: u32,
    pub object_id: String,
    /// Known only once an entry has gone through `cacheable_put` on this
    /// client; a pure `cacheable_get` miss that refetches from the server
    /// has no path of its own to key by, so this is empty in that case.
    pub file_path: String,
    pub is_dirty: bool,
    pub timestamp: i64,
}
