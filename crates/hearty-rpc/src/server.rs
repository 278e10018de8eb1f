// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RPC service: one process-wide `tokio::sync::Mutex` guarding the
//! cache-ownership map, non-blocking `try_lock` admission, streamed `Get`,
//! and the `Cache`/`Evict` coherence state machine.
//!
//! `tokio::sync::Mutex` is used here (rather than `parking_lot::Mutex`,
//! which `hearty-cache` uses for its purely-synchronous client-side state)
//! because the guard must stay held across the `.await` points this
//! handler needs: the chunked `Get` stream writes, and the `Cache`→`Evict`
//! dial-back into a previous owner. A `parking_lot` guard is not meant to
//! cross a suspension point.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use hearty_store::StoreEngine;

use crate::client;
use crate::codec::{self, Transport};
use crate::error::Result;
use crate::protocol::{GetChunk, PutResponse, Request, Response, SimpleResponse, BUSY_MESSAGE};

/// Process-wide mutable state besides the disk: which client currently
/// owns a cached copy of each object.
struct ServerState {
    ownership: HashMap<String, SocketAddr>,
}

pub struct HeartyServer {
    engine: StoreEngine,
    state: Mutex<ServerState>,
}

impl HeartyServer {
    pub fn new(engine: StoreEngine) -> Arc<Self> {
        Arc::new(Self {
            engine,
            state: Mutex::new(ServerState {
                ownership: HashMap::new(),
            }),
        })
    }

    pub async fn run(self: Arc<Self>, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "hearty-store server listening");
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                    tracing::warn!(%peer_addr, error = %e, "connection ended with error");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        let mut transport = codec::wrap(stream);
        let Some(request) = codec::read_message::<Request>(&mut transport).await? else {
            return Ok(());
        };
        tracing::info!(%peer_addr, ?request, "handling request");
        self.dispatch(request, peer_addr, &mut transport).await
    }

    async fn dispatch(
        &self,
        request: Request,
        peer_addr: SocketAddr,
        transport: &mut Transport,
    ) -> Result<()> {
        let mut guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(%peer_addr, "server busy, rejecting request");
                return self.respond_simple(transport, SimpleResponse::failure(BUSY_MESSAGE)).await;
            }
        };

        match request {
            Request::Init { store_name } => {
                let response = match self.engine.initialize(store_name) {
                    Ok(()) => SimpleResponse::ok(format!("store {store_name} created")),
                    Err(e) => SimpleResponse::failure(e.to_string()),
                };
                self.respond_simple(transport, response).await
            }
            Request::Put {
                store_name,
                file_path,
                file_content,
            } => {
                let response = match self.engine.put(store_name, &file_path, &file_content) {
                    Ok(file_id) => PutResponse {
                        success: true,
                        file_id: Some(file_id),
                        message: "ok".to_string(),
                    },
                    Err(e) => PutResponse {
                        success: false,
                        file_id: None,
                        message: e.to_string(),
                    },
                };
                codec::write_message(transport, &Response::Put(response)).await
            }
            Request::Get {
                store_name,
                file_identifier,
            } => self.handle_get(transport, store_name, &file_identifier).await,
            Request::List => {
                let response = match self.engine.list_stores_formatted() {
                    Ok(message) => SimpleResponse::ok(message),
                    Err(e) => SimpleResponse::failure(e.to_string()),
                };
                self.respond_simple(transport, response).await
            }
            Request::Destroy { store_name } => {
                let response = match self.engine.destroy_store(store_name) {
                    Ok(()) => SimpleResponse::ok(format!("store {store_name} destroyed")),
                    Err(e) => SimpleResponse::failure(e.to_string()),
                };
                self.respond_simple(transport, response).await
            }
            Request::Cache {
                file_id,
                peer_addr: requester,
            } => {
                let response = match guard.ownership.get(&file_id).copied() {
                    None => {
                        guard.ownership.insert(file_id, requester);
                        SimpleResponse::ok("ownership granted")
                    }
                    Some(owner) if owner == requester => SimpleResponse::ok("ownership confirmed"),
                    Some(owner) => match client::call_evict(owner, &file_id).await {
                        Ok(true) => {
                            guard.ownership.insert(file_id, requester);
                            SimpleResponse::ok("ownership transferred")
                        }
                        Ok(false) => SimpleResponse::failure(format!(
                            "previous owner {owner} rejected eviction of {file_id}"
                        )),
                        Err(e) => SimpleResponse::failure(format!(
                            "could not reach previous owner {owner}: {e}"
                        )),
                    },
                };
                self.respond_simple(transport, response).await
            }
            Request::Evict { file_id } => {
                guard.ownership.remove(&file_id);
                self.respond_simple(transport, SimpleResponse::ok("evicted")).await
            }
        }
    }

    async fn handle_get(
        &self,
        transport: &mut Transport,
        store_name: u32,
        file_identifier: &str,
    ) -> Result<()> {
        match self.engine.get(store_name, file_identifier) {
            Ok(bytes) if bytes.is_empty() => {
                codec::write_message(
                    transport,
                    &Response::GetChunk(GetChunk {
                        success: false,
                        file_content: Vec::new(),
                        message: "object content is empty".to_string(),
                    }),
                )
                .await
            }
            Ok(bytes) => {
                for chunk in bytes.chunks(hearty_store::layout::BLOCK_SIZE) {
                    codec::write_message(
                        transport,
                        &Response::GetChunk(GetChunk {
                            success: true,
                            file_content: chunk.to_vec(),
                            message: "ok".to_string(),
                        }),
                    )
                    .await?;
                }
                Ok(())
            }
            Err(e) => {
                codec::write_message(
                    transport,
                    &Response::GetChunk(GetChunk {
                        success: false,
                        file_content: Vec::new(),
                        message: e.to_string(),
                    }),
                )
                .await
            }
        }
    }

    async fn respond_simple(&self, transport: &mut Transport, response: SimpleResponse) -> Result<()> {
        codec::write_message(transport, &Response::Simple(response)).await
    }
}
