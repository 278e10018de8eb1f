// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire transport: `serde_json` messages framed with
//! `tokio_util::codec::LengthDelimitedCodec` over a `TcpStream`. JSON over
//! length-delimited frames keeps message boundaries explicit without
//! pulling in a separate binary serialization crate.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{Error, Result};

pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub fn wrap(stream: TcpStream) -> Transport {
    Framed::new(stream, LengthDelimitedCodec::new())
}

pub async fn write_message<T: Serialize>(transport: &mut Transport, message: &T) -> Result<()> {
    let bytes = serde_json::to_vec(message).map_err(|e| Error::Protocol(e.to_string()))?;
    transport
        .send(Bytes::from(bytes))
        .await
        .map_err(Error::Io)?;
    Ok(())
}

/// Reads exactly one frame and decodes it. Returns `Ok(None)` if the peer
/// closed the connection without sending a frame.
pub async fn read_message<T: DeserializeOwned>(transport: &mut Transport) -> Result<Option<T>> {
    match transport.next().await {
        Some(Ok(frame)) => {
            let value = serde_json::from_slice(&frame).map_err(|e| Error::Protocol(e.to_string()))?;
            Ok(Some(value))
        }
        Some(Err(e)) => Err(Error::Io(e)),
        None => Ok(None),
    }
}
