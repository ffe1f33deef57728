// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Companion-side client for the tracker server.
//!
//! Requests are strictly alternated with replies: replying commands wait for
//! the answer, pose/data updates return as soon as the frame is written.

use crate::config::connect_address;
use crate::protocol::{
    encode_message, read_frame, to_archive_string, write_frame, Command, FrameError,
    ProtocolError, Reply,
};
use crate::tracker::{DataPacket, PosePacket, TrackerDescriptor};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Connection closed by server")]
    Closed,

    #[error("Server rejected the tracker descriptor")]
    Rejected,
}

/// Connection to a tracker server.
pub struct TrackerClient {
    stream: TcpStream,
    peer_addr: SocketAddr,
    max_message_size: usize,
    buffer: Vec<u8>,
}

impl TrackerClient {
    /// Connect to `endpoint` (`host:port`, `tcp://host:port`, `tcp://*:port`).
    pub async fn connect(endpoint: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(connect_address(endpoint)).await?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        debug!("Connected to tracker server at {}", peer_addr);

        Ok(Self {
            stream,
            peer_addr,
            max_message_size: 1024 * 1024,
            buffer: Vec::new(),
        })
    }

    /// Override the largest frame this client sends or accepts.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Register a tracker and return the id the server assigned.
    pub async fn add_tracker(
        &mut self,
        descriptor: &TrackerDescriptor,
    ) -> Result<usize, ClientError> {
        let archive = to_archive_string(descriptor);
        let reply = self
            .request(Command::AddTracker, &[archive.as_str()])
            .await?;
        Reply::parse_tracker_id(&reply)?.ok_or(ClientError::Rejected)
    }

    /// Spawn every tracker and set all states.
    pub async fn set_state_all(&mut self, active: bool) -> Result<bool, ClientError> {
        let reply = self
            .request(Command::SetStateAll, &[bool_param(active)])
            .await?;
        Ok(Reply::parse_ack(&reply)?)
    }

    /// Set one tracker's state; `false` when the server does not know `id`.
    pub async fn set_state(&mut self, id: usize, active: bool) -> Result<bool, ClientError> {
        let id = id.to_string();
        let reply = self
            .request(Command::SetState, &[id.as_str(), bool_param(active)])
            .await?;
        Ok(Reply::parse_ack(&reply)?)
    }

    /// Send a pose update. The server never answers these.
    pub async fn update_pose(&mut self, id: usize, pose: &PosePacket) -> Result<(), ClientError> {
        let id = id.to_string();
        let archive = to_archive_string(pose);
        self.send(Command::UpdatePose, &[id.as_str(), archive.as_str()])
            .await
    }

    /// Send a data update. The server never answers these.
    pub async fn update_data(&mut self, id: usize, data: &DataPacket) -> Result<(), ClientError> {
        let id = id.to_string();
        let archive = to_archive_string(data);
        self.send(Command::UpdateData, &[id.as_str(), archive.as_str()])
            .await
    }

    /// Send a message verbatim, optionally waiting for a reply.
    pub async fn send_raw(
        &mut self,
        message: &str,
        expect_reply: bool,
    ) -> Result<Option<String>, ClientError> {
        self.write(message).await?;
        if !expect_reply {
            return Ok(None);
        }
        self.read_reply().await.map(Some)
    }

    async fn request(
        &mut self,
        command: Command,
        parameters: &[&str],
    ) -> Result<String, ClientError> {
        self.send(command, parameters).await?;
        let reply = self.read_reply().await?;
        debug!("{} -> {:?}", command, reply);
        Ok(reply)
    }

    async fn send(&mut self, command: Command, parameters: &[&str]) -> Result<(), ClientError> {
        let message = encode_message(command.as_str(), parameters)?;
        self.write(&message).await
    }

    async fn write(&mut self, message: &str) -> Result<(), ClientError> {
        write_frame(&mut self.stream, message.as_bytes(), self.max_message_size).await?;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<String, ClientError> {
        if !read_frame(&mut self.stream, &mut self.buffer, self.max_message_size).await? {
            return Err(ClientError::Closed);
        }
        Ok(String::from_utf8_lossy(&self.buffer).into_owned())
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ReplySocket;
    use crate::tracker::TrackerRole;

    /// Serve `replies` in order, returning every request received.
    async fn scripted_server(
        replies: Vec<Option<&'static str>>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let mut socket = ReplySocket::bind("127.0.0.1:0", 4096).await.unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        let task = tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in replies {
                let request = socket.recv().await.unwrap().to_vec();
                requests.push(String::from_utf8(request).unwrap());
                if let Some(reply) = reply {
                    socket.send(reply.as_bytes()).await.unwrap();
                }
            }
            requests
        });
        (addr, task)
    }

    #[tokio::test]
    async fn test_requests_on_the_wire() {
        let (addr, server) = scripted_server(vec![Some("0"), Some("1"), None, Some("0")]).await;
        let mut client = TrackerClient::connect(&format!("tcp://{}", addr)).await.unwrap();

        let descriptor = TrackerDescriptor::new("K2-0", TrackerRole::Waist);
        assert_eq!(client.add_tracker(&descriptor).await.unwrap(), 0);
        assert!(client.set_state_all(true).await.unwrap());
        client.update_pose(0, &PosePacket::default()).await.unwrap();
        assert!(!client.set_state(3, false).await.unwrap());

        let requests = server.await.unwrap();
        assert_eq!(
            requests[0],
            format!("/CADD_TRACKER/P{}/T", to_archive_string(&descriptor))
        );
        assert_eq!(requests[1], "/CSET_STATE_ALL/P1/T");
        assert!(requests[2].starts_with("/CUPDATE_POSE/P0/P1"));
        assert_eq!(requests[3], "/CSET_STATE/P3/P10/T");
    }

    #[tokio::test]
    async fn test_add_tracker_rejected() {
        let (addr, server) = scripted_server(vec![Some("-1")]).await;
        let mut client = TrackerClient::connect(&addr).await.unwrap();

        let err = client
            .add_tracker(&TrackerDescriptor::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_ack() {
        let (addr, server) = scripted_server(vec![Some("yes")]).await;
        let mut client = TrackerClient::connect(&addr).await.unwrap();

        let err = client.set_state_all(false).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::InvalidReply(_))
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_max_message_size_limits_requests() {
        let (addr, server) = scripted_server(vec![Some("1")]).await;
        let mut client = TrackerClient::connect(&addr)
            .await
            .unwrap()
            .with_max_message_size(32);

        let err = client
            .update_pose(0, &PosePacket::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Frame(FrameError::TooLarge { max: 32, .. })
        ));

        // Nothing was written, so the connection is still usable
        assert!(client.set_state_all(true).await.unwrap());
        assert_eq!(server.await.unwrap(), vec!["/CSET_STATE_ALL/P1/T"]);
    }

    #[tokio::test]
    async fn test_send_raw() {
        let (addr, server) = scripted_server(vec![None, Some("1")]).await;
        let mut client = TrackerClient::connect(&addr).await.unwrap();

        let reply = client.send_raw("/CSET_STATE_ALL/P1", false).await.unwrap();
        assert_eq!(reply, None);
        let reply = client.send_raw("/CSET_STATE_ALL/P1/T", true).await.unwrap();
        assert_eq!(reply.as_deref(), Some("1"));

        let requests = server.await.unwrap();
        assert_eq!(requests, vec!["/CSET_STATE_ALL/P1", "/CSET_STATE_ALL/P1/T"]);
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let mut socket = ReplySocket::bind("127.0.0.1:0", 4096).await.unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            socket.recv().await.unwrap();
            drop(socket);
        });

        let mut client = TrackerClient::connect(&addr).await.unwrap();
        let err = client.set_state_all(true).await.unwrap_err();
        assert!(matches!(err, ClientError::Closed | ClientError::Frame(_)));
        server.await.unwrap();
    }
}
