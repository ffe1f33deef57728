// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reply-style endpoint owned by the request loop.
//!
//! Serves one client at a time. `recv` blocks until a frame arrives, accepting
//! a new client whenever the previous one disconnects; `send` answers on the
//! connection the last request came from.

use crate::protocol::{read_frame, write_frame, FrameError};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// Endpoint errors.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Bind error on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("Accept error: {0}")]
    Accept(std::io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("No client connected")]
    NotConnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound request-reply endpoint.
pub struct ReplySocket {
    listener: TcpListener,
    client: Option<(TcpStream, SocketAddr)>,
    max_message_size: usize,
    buffer: Vec<u8>,
}

impl ReplySocket {
    /// Bind to a socket address.
    pub async fn bind(address: &str, max_message_size: usize) -> Result<Self, SocketError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| SocketError::Bind {
                endpoint: address.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            client: None,
            max_message_size,
            buffer: Vec::with_capacity(4096),
        })
    }

    /// Local address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.listener.local_addr()?)
    }

    /// Address of the client currently being served.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.client.as_ref().map(|(_, addr)| *addr)
    }

    /// Receive the next request.
    ///
    /// There is no timeout: with no client connected this waits indefinitely.
    /// On a framing or read error the client is dropped and the error returned.
    pub async fn recv(&mut self) -> Result<&[u8], SocketError> {
        loop {
            if self.client.is_none() {
                let (stream, peer_addr) =
                    self.listener.accept().await.map_err(SocketError::Accept)?;
                info!("Client connected from {}", peer_addr);
                self.client = Some((stream, peer_addr));
            }

            let Some((stream, peer_addr)) = self.client.as_mut() else {
                continue;
            };
            let peer_addr = *peer_addr;

            match read_frame(stream, &mut self.buffer, self.max_message_size).await {
                Ok(true) => return Ok(self.buffer.as_slice()),
                Ok(false) => {
                    info!("Client disconnected: {}", peer_addr);
                    self.client = None;
                }
                Err(e) => {
                    debug!("Dropping client {}: {}", peer_addr, e);
                    self.client = None;
                    return Err(e.into());
                }
            }
        }
    }

    /// Send a reply to the client of the last request.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        let (stream, _) = self.client.as_mut().ok_or(SocketError::NotConnected)?;
        if let Err(e) = write_frame(stream, payload, self.max_message_size).await {
            self.client = None;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_failure() {
        let first = ReplySocket::bind("127.0.0.1:0", 1024).await.unwrap();
        let addr = first.local_addr().unwrap();

        let err = ReplySocket::bind(&addr.to_string(), 1024).await;
        assert!(matches!(err, Err(SocketError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_send_without_client() {
        let mut socket = ReplySocket::bind("127.0.0.1:0", 1024).await.unwrap();
        assert!(socket.peer_addr().is_none());
        assert!(matches!(
            socket.send(b"1").await,
            Err(SocketError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_request_reply() {
        let mut socket = ReplySocket::bind("127.0.0.1:0", 1024).await.unwrap();
        let addr = socket.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            write_frame(&mut stream, b"/CSET_STATE_ALL/P1/T", 1024)
                .await
                .unwrap();
            let mut buf = Vec::new();
            assert!(read_frame(&mut stream, &mut buf, 1024).await.unwrap());
            buf
        });

        let request = socket.recv().await.unwrap().to_vec();
        assert_eq!(request, b"/CSET_STATE_ALL/P1/T");
        socket.send(b"1").await.unwrap();

        assert_eq!(client.await.unwrap(), b"1");
    }

    #[tokio::test]
    async fn test_next_client_after_disconnect() {
        let mut socket = ReplySocket::bind("127.0.0.1:0", 1024).await.unwrap();
        let addr = socket.local_addr().unwrap();

        let clients = tokio::spawn(async move {
            // First client leaves without sending anything
            drop(TcpStream::connect(addr).await.unwrap());
            let mut stream = TcpStream::connect(addr).await.unwrap();
            write_frame(&mut stream, b"second", 1024).await.unwrap();
            stream
        });

        let request = socket.recv().await.unwrap().to_vec();
        assert_eq!(request, b"second");
        drop(clients.await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_frame_keeps_client() {
        use tokio::io::AsyncWriteExt;

        let mut socket = ReplySocket::bind("127.0.0.1:0", 1024).await.unwrap();
        let addr = socket.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&0u32.to_be_bytes()).await.unwrap();
            write_frame(&mut stream, b"/CSET_STATE_ALL/P1/T", 1024)
                .await
                .unwrap();
            let mut buf = Vec::new();
            assert!(read_frame(&mut stream, &mut buf, 1024).await.unwrap());
            buf
        });

        assert!(socket.recv().await.unwrap().is_empty());
        let peer = socket.peer_addr();
        assert!(peer.is_some());

        let request = socket.recv().await.unwrap().to_vec();
        assert_eq!(request, b"/CSET_STATE_ALL/P1/T");
        assert_eq!(socket.peer_addr(), peer);
        socket.send(b"1").await.unwrap();

        assert_eq!(client.await.unwrap(), b"1");
    }

    #[tokio::test]
    async fn test_oversized_frame_drops_client() {
        let mut socket = ReplySocket::bind("127.0.0.1:0", 8).await.unwrap();
        let addr = socket.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            write_frame(&mut stream, b"0123456789", 1024).await.unwrap();
            stream
        });

        let result = socket.recv().await.map(|request| request.to_vec());
        assert!(matches!(
            result,
            Err(SocketError::Frame(FrameError::TooLarge { len: 10, max: 8 }))
        ));
        assert!(socket.peer_addr().is_none());
        drop(client.await.unwrap());
    }
}
