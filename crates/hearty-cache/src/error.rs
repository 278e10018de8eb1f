// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error type for the client cache.

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Rpc(#[from] hearty_rpc::Error),

    #[error("malformed cache index: {0}")]
    Index(String),
}

pub type Result<T> = std::result::Result<T, Error>;
