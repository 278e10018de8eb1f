// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-capacity block store engine: on-disk layout, metadata codec,
//! block allocator, write-ahead log, and the engine that composes them
//! into `initialize` / `put` / `get` / `list_stores` / `destroy_store`.

pub mod allocator;
pub mod engine;
pub mod error;
pub mod id;
pub mod layout;
pub mod metadata;
pub mod wal;

pub use engine::{StoreEngine, StoreSummary};
pub use error::{Error, Result};
