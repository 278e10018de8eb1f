// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin client stubs over the wire protocol. Used both by the CLI
//! (`hearty-cli`), the client-side cache (`hearty-cache`), and the server
//! itself when dialing back into a previous cache owner's `Evict`
//! endpoint.

use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::codec;
use crate::error::{Error, Result};
use crate::protocol::{PutResponse, Request, Response, SimpleResponse};

async fn call_simple(addr: SocketAddr, request: Request) -> Result<SimpleResponse> {
    let stream = TcpStream::connect(addr).await?;
    let mut transport = codec::wrap(stream);
    codec::write_message(&mut transport, &request).await?;
    match codec::read_message::<Response>(&mut transport).await? {
        Some(Response::Simple(response)) => Ok(response),
        Some(other) => Err(Error::Protocol(format!("unexpected response shape: {other:?}"))),
        None => Err(Error::Protocol("connection closed with no response".to_string())),
    }
}

pub async fn call_init(addr: SocketAddr, store_name: u32) -> Result<SimpleResponse> {
    call_simple(addr, Request::Init { store_name }).await
}

pub async fn call_destroy(addr: SocketAddr, store_name: u32) -> Result<SimpleResponse> {
    call_simple(addr, Request::Destroy { store_name }).await
}

pub async fn call_list(addr: SocketAddr) -> Result<SimpleResponse> {
    call_simple(addr, Request::List).await
}

pub async fn call_put(
    addr: SocketAddr,
    store_name: u32,
    file_path: String,
    file_content: Vec<u8>,
) -> Result<PutResponse> {
    let stream = TcpStream::connect(addr).await?;
    let mut transport = codec::wrap(stream);
    codec::write_message(
        &mut transport,
        &Request::Put {
            store_name,
            file_path,
            file_content,
        },
    )
    .await?;
    match codec::read_message::<Response>(&mut transport).await? {
        Some(Response::Put(response)) => Ok(response),
        Some(other) => Err(Error::Protocol(format!("unexpected response shape: {other:?}"))),
        None => Err(Error::Protocol("connection closed with no response".to_string())),
    }
}

/// Issues a `Get`, concatenating every chunk frame until the connection
/// closes. Returns an error built from the first failed chunk, if any.
pub async fn call_get(addr: SocketAddr, store_name: u32, file_identifier: String) -> Result<Vec<u8>> {
    let stream = TcpStream::connect(addr).await?;
    let mut transport = codec::wrap(stream);
    codec::write_message(
        &mut transport,
        &Request::Get {
            store_name,
            file_identifier,
        },
    )
    .await?;

    let mut content = Vec::new();
    loop {
        match codec::read_message::<Response>(&mut transport).await? {
            Some(Response::GetChunk(chunk)) => {
                if !chunk.success {
                    return Err(Error::Protocol(chunk.message));
                }
                content.extend_from_slice(&chunk.file_content);
            }
            Some(other) => {
                return Err(Error::Protocol(format!("unexpected response shape: {other:?}")));
            }
            None => break,
        }
    }
    Ok(content)
}

/// Requests ownership of `file_id`, stating `peer_addr` as the caller's own
/// eviction-listening address so the server can dial back into it later.
pub async fn call_cache(
    addr: SocketAddr,
    file_id: String,
    peer_addr: SocketAddr,
) -> Result<SimpleResponse> {
    call_simple(addr, Request::Cache { file_id, peer_addr }).await
}

/// Calls a peer's `Evict` endpoint directly (server-to-client dial-back).
/// Returns `Ok(true)` iff the peer confirmed the writeback+invalidate.
pub async fn call_evict(addr: SocketAddr, file_id: &str) -> Result<bool> {
    let response = call_simple(
        addr,
        Request::Evict {
            file_id: file_id.to_string(),
        },
    )
    .await?;
    Ok(response.success)
}
