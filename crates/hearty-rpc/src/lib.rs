// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RPC service: wire protocol, length-delimited JSON codec, the
//! lock-serialized server, and client stubs.

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};
pub use server::HeartyServer;

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;

    async fn spawn_server() -> (SocketAddr, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = hearty_store::StoreEngine::new(dir.path());
        let server = HeartyServer::new(engine);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let bound = server.clone();
        tokio::spawn(async move {
            let _ = bound.run(addr).await;
        });
        // give the listener a beat to bind before the first connect.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        (addr, dir)
    }

    #[tokio::test]
    async fn init_put_get_round_trip() {
        let (addr, _dir) = spawn_server().await;

        let init = client::call_init(addr, 20).await.unwrap();
        assert!(init.success);

        let put = client::call_put(addr, 20, "/t/a.txt".to_string(), b"hello".to_vec())
            .await
            .unwrap();
        assert!(put.success);
        let file_id = put.file_id.unwrap();

        let bytes = client::call_get(addr, 20, file_id).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn get_missing_object_is_an_error_chunk() {
        let (addr, _dir) = spawn_server().await;
        client::call_init(addr, 1).await.unwrap();
        let result = client::call_get(addr, 1, "no-such-id".to_string()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn list_reports_no_store_found_initially() {
        let (addr, _dir) = spawn_server().await;
        let list = client::call_list(addr).await.unwrap();
        assert!(list.success);
        assert_eq!(list.message, "No store found");
    }

    #[tokio::test]
    async fn cache_then_evict_round_trip() {
        let (addr, _dir) = spawn_server().await;
        let peer_a: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        let peer_b: SocketAddr = "127.0.0.1:40002".parse().unwrap();

        let granted = client::call_cache(addr, "obj-1".to_string(), peer_a).await.unwrap();
        assert!(granted.success);

        let confirmed = client::call_cache(addr, "obj-1".to_string(), peer_a).await.unwrap();
        assert!(confirmed.success);

        // peer_b requests ownership while peer_a still owns it and isn't
        // actually listening: the dial-back fails, so the transfer fails too.
        let transfer = client::call_cache(addr, "obj-1".to_string(), peer_b).await.unwrap();
        assert!(!transfer.success);
    }
}
