// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire messages for the RPC surface. Field names (`store_name`,
//! `file_path`, `file_content`, `file_id`, `file_identifier`) match what
//! clients and servers actually agree on over the wire, rather than the
//! more Rust-idiomatic names the engine crate uses internally.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// One request per connection: every op is a unary request, `Get`'s
/// response is the only one that spans multiple frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Init {
        store_name: u32,
    },
    Put {
        store_name: u32,
        file_path: String,
        file_content: Vec<u8>,
    },
    Get {
        store_name: u32,
        file_identifier: String,
    },
    List,
    Destroy {
        store_name: u32,
    },
    /// `peer_addr` is the requesting client's own Evict-listening address.
    /// It must be stated explicitly here rather than inferred from the
    /// connection's peer address, which is an ephemeral outbound port the
    /// server could never dial back into.
    Cache {
        file_id: String,
        peer_addr: SocketAddr,
    },
    Evict {
        file_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub success: bool,
    pub message: String,
}

impl SimpleResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResponse {
    pub success: bool,
    pub file_id: Option<String>,
    pub message: String,
}

/// One frame of a `Get` response stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChunk {
    pub success: bool,
    pub file_content: Vec<u8>,
    pub message: String,
}

/// Response envelope multiplexed over the single frame type the codec
/// carries; the client knows which arm to expect from the request it sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Simple(SimpleResponse),
    Put(PutResponse),
    GetChunk(GetChunk),
}

/// Soft-busy message returned when the server-wide lock can't be acquired.
/// Not a transport error — a normal `Response::Simple`.
pub const BUSY_MESSAGE: &str = "Server is handling another request";
