// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eviction endpoint: a tiny RPC server the client runs so the store
//! server can dial back into it and demand writeback+invalidate. Reuses
//! `hearty_rpc`'s wire protocol and codec — this is the same
//! `Request`/`Response` shape the store server speaks, just a single
//! handler (`Evict`) instead of the full request surface.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use hearty_rpc::codec;
use hearty_rpc::protocol::{Request, Response, SimpleResponse};

use crate::cache::ClientCache;
use crate::error::Result;

/// Binds a listener on `addr` and serves `Evict` requests against `cache`
/// until the process exits. Connectivity is best-effort: a client that
/// isn't reachable simply causes the server's `Cache` call to fail for the
/// requester, nothing retries here.
pub async fn serve(cache: Arc<ClientCache>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "eviction endpoint listening");
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(cache, stream).await {
                tracing::warn!(%peer_addr, error = %e, "eviction connection ended with error");
            }
        });
    }
}

async fn handle_connection(cache: Arc<ClientCache>, stream: tokio::net::TcpStream) -> Result<()> {
    let mut transport = codec::wrap(stream);
    let Some(request) = codec::read_message::<Request>(&mut transport).await? else {
        return Ok(());
    };

    let response = match request {
        Request::Evict { file_id } => {
            match cache.handle_server_evict(&file_id).await {
                Ok(()) => SimpleResponse::ok("evicted"),
                Err(e) => SimpleResponse::failure(e.to_string()),
            }
        }
        other => SimpleResponse::failure(format!("eviction endpoint only serves Evict, got {other:?}")),
    };

    codec::write_message(&mut transport, &Response::Simple(response)).await?;
    Ok(())
}
