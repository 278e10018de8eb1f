// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error type for the RPC layer. Transport/protocol failures are distinct
//! from the engine's logical failures: the latter never leave the engine
//! crate's `Error` — handlers turn them into `success=false` responses
//! instead, so this enum only needs to cover what happens below the
//! application layer.

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server is busy")]
    Busy,

    #[error("cache coherence failure: {0}")]
    Coherence(String),
}

pub type Result<T> = std::result::Result<T, Error>;
