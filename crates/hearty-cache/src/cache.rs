// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client cache: bounded FIFO write-back cache keyed by `object_id`,
//! persisted to disk, coordinating with the server for coherence.
//!
//! Split into a synchronous `CacheStore` (the FIFO map, local object
//! files, and the index — no suspension points) guarded by a
//! `parking_lot::Mutex`, and `ClientCache`, the async orchestrator that
//! locks it only for brief synchronous steps and does its networking
//! (`hearty_rpc::client`) outside the lock. A `parking_lot` guard must
//! never be held across an `.await`, so the lock only ever brackets
//! synchronous FIFO bookkeeping.

use std::collections::VecDeque;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::Mutex;

use hearty_rpc::client as rpc;

use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::index::{self, INDEX_FILENAME};

/// Default bound on cache entries before the FIFO head gets evicted.
pub const DEFAULT_CAPACITY: usize = 8;

struct CacheStore {
    dir: PathBuf,
    capacity: usize,
    entries: VecDeque<CacheEntry>,
}

impl CacheStore {
    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILENAME)
    }

    fn object_path(&self, object_id: &str) -> PathBuf {
        self.dir.join(object_id)
    }

    fn persist(&self) -> Result<()> {
        let entries: Vec<CacheEntry> = self.entries.iter().cloned().collect();
        index::write_index(&self.index_path(), &entries)
    }

    fn find_by_object(&self, object_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.object_id == object_id)
    }

    fn find_by_path(&self, store_id: u32, file_path: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.store_id == store_id && e.file_path == file_path)
    }

    fn read_local(&self, object_id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.object_path(object_id))?)
    }

    fn write_local(&self, object_id: &str, content: &[u8]) -> Result<()> {
        fs::write(self.object_path(object_id), content)?;
        Ok(())
    }

    fn delete_local(&self, object_id: &str) {
        let _ = fs::remove_file(self.object_path(object_id));
    }

    /// Inserts a fresh entry, evicting the FIFO head first if at capacity.
    /// The evicted entry's local file is deliberately left on disk: the
    /// caller must read it back (if dirty) before calling `delete_local`,
    /// since the evicted object's bytes are the only copy of a write this
    /// client never sent to the server.
    fn insert(&mut self, entry: CacheEntry, content: &[u8]) -> Result<Option<CacheEntry>> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.write_local(&entry.object_id, content)?;
        self.entries.push_back(entry);
        self.persist()?;
        Ok(evicted)
    }

    fn remove_at(&mut self, index: usize) -> Option<CacheEntry> {
        let entry = self.entries.remove(index);
        if let Some(e) = &entry {
            self.delete_local(&e.object_id);
        }
        let _ = self.persist();
        entry
    }

    fn mark_dirty(&mut self, index: usize, content: &[u8]) -> Result<()> {
        let object_id = self.entries[index].object_id.clone();
        self.write_local(&object_id, content)?;
        self.entries[index].is_dirty = true;
        self.entries[index].timestamp = Utc::now().timestamp();
        self.persist()
    }
}

/// Client-side write-back cache, coordinating with the server's
/// `Cache`/`Evict` ownership protocol.
pub struct ClientCache {
    store: Mutex<CacheStore>,
    server_addr: SocketAddr,
    /// This client's own `Evict`-listening address, stated explicitly on
    /// every `Cache` request (see `hearty_rpc::protocol::Request::Cache`).
    my_evict_addr: SocketAddr,
}

impl ClientCache {
    pub fn open(
        dir: impl Into<PathBuf>,
        capacity: usize,
        server_addr: SocketAddr,
        my_evict_addr: SocketAddr,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let entries = index::read_index(&dir.join(INDEX_FILENAME))?.into();
        Ok(Self {
            store: Mutex::new(CacheStore { dir, capacity, entries }),
            server_addr,
            my_evict_addr,
        })
    }

    async fn write_back(&self, store_id: u32, file_path: &str, content: &[u8]) -> Result<()> {
        rpc::call_put(self.server_addr, store_id, file_path.to_string(), content.to_vec())
            .await
            .map_err(Error::Rpc)?;
        Ok(())
    }

    async fn confirm_ownership(&self, object_id: &str) -> bool {
        matches!(
            rpc::call_cache(self.server_addr, object_id.to_string(), self.my_evict_addr).await,
            Ok(response) if response.success
        )
    }

    /// Serves `object_id` from the local cache if this client can still
    /// confirm ownership; otherwise refetches from the server and recaches.
    pub async fn cacheable_get(&self, store_id: u32, object_id: &str) -> Result<Vec<u8>> {
        let existing = {
            let store = self.store.lock();
            store
                .find_by_object(object_id)
                .map(|i| (i, store.entries[i].clone()))
        };

        if existing.is_some() && self.confirm_ownership(object_id).await {
            let store = self.store.lock();
            return store.read_local(object_id);
        }

        let bytes = rpc::call_get(self.server_addr, store_id, object_id.to_string())
            .await
            .map_err(Error::Rpc)?;

        if let Some((index, _)) = &existing {
            let mut store = self.store.lock();
            store.remove_at(*index);
        }

        let file_path = existing.map(|(_, e)| e.file_path).unwrap_or_default();
        self.recache(store_id, object_id, &file_path, &bytes, false).await?;
        Ok(bytes)
    }

    /// Writes `content` under `file_path`, going through the cache: if this
    /// client already owns (or regains) the entry, the write is deferred
    /// (marked dirty, no network traffic); otherwise it writes through.
    pub async fn cacheable_put(&self, store_id: u32, file_path: &str, content: &[u8]) -> Result<String> {
        let existing = {
            let store = self.store.lock();
            store
                .find_by_path(store_id, file_path)
                .map(|i| (i, store.entries[i].object_id.clone()))
        };

        if let Some((index, object_id)) = existing {
            if self.confirm_ownership(&object_id).await {
                let mut store = self.store.lock();
                store.mark_dirty(index, content)?;
                return Ok(object_id);
            }
        }

        let response = rpc::call_put(self.server_addr, store_id, file_path.to_string(), content.to_vec())
            .await
            .map_err(Error::Rpc)?;
        if !response.success {
            return Err(Error::Rpc(hearty_rpc::Error::Protocol(response.message)));
        }
        let object_id = response.file_id.ok_or_else(|| {
            Error::Rpc(hearty_rpc::Error::Protocol("put succeeded with no file_id".to_string()))
        })?;

        if let Some((index, _)) = existing {
            let mut store = self.store.lock();
            store.remove_at(index);
        }
        self.recache(store_id, &object_id, file_path, content, false).await?;
        Ok(object_id)
    }

    async fn recache(
        &self,
        store_id: u32,
        object_id: &str,
        file_path: &str,
        content: &[u8],
        is_dirty: bool,
    ) -> Result<()> {
        let entry = CacheEntry {
            store_id,
            object_id: object_id.to_string(),
            file_path: file_path.to_string(),
            is_dirty,
            timestamp: Utc::now().timestamp(),
        };
        let evicted = {
            let mut store = self.store.lock();
            store.insert(entry, content)?
        };
        if let Some(old) = evicted {
            if old.is_dirty {
                let bytes = {
                    let store = self.store.lock();
                    store.read_local(&old.object_id)
                };
                match bytes {
                    Ok(bytes) => {
                        if let Err(e) = self.write_back(old.store_id, &old.file_path, &bytes).await {
                            tracing::warn!(object_id = %old.object_id, error = %e, "eviction write-back failed");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(object_id = %old.object_id, error = %e, "could not read evicted entry for write-back");
                    }
                }
            }
            let store = self.store.lock();
            store.delete_local(&old.object_id);
        }
        Ok(())
    }

    /// Handles a server-driven `Evict(object_id)`: writes back if dirty,
    /// then drops the local file and entry. Always "succeeds" from the
    /// caller's point of view, even if the entry was already absent.
    pub async fn handle_server_evict(&self, object_id: &str) -> Result<()> {
        let found = {
            let store = self.store.lock();
            store.find_by_object(object_id).map(|i| store.entries[i].clone())
        };
        let Some(entry) = found else {
            return Ok(());
        };

        if entry.is_dirty {
            let bytes = {
                let store = self.store.lock();
                store.read_local(object_id)?
            };
            self.write_back(entry.store_id, &entry.file_path, &bytes).await?;
        }

        let mut store = self.store.lock();
        if let Some(index) = store.find_by_object(object_id) {
            store.remove_at(index);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.store.lock().entries.len()
    }
}
