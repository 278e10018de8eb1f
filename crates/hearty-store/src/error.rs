// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error type for the store engine: one `thiserror` enum at the crate
//! boundary, with `Io` folded in via `#[from]`.

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("store not found")]
    NotFound,

    #[error("store already exists")]
    AlreadyExists,

    #[error("no free blocks available")]
    NoCapacity,

    #[error("file too large: {len} bytes exceeds block size")]
    TooLarge { len: usize },

    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    #[error("corrupt write-ahead log: {0}")]
    WalCorrupt(String),

    #[error("put failed: {0}")]
    PutFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
