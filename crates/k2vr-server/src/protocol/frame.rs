// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed framing shared by the server endpoint and the client.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty frame")]
    Empty,

    #[error("Frame too large: {len} > {max}")]
    TooLarge { len: usize, max: usize },
}

/// Read one frame into `buf`.
///
/// Returns `Ok(false)` if the peer closed the stream before a new frame began.
/// A zero-length frame leaves `buf` empty and keeps the stream usable.
pub async fn read_frame<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_size: usize,
) -> Result<bool, FrameError>
where
    R: AsyncRead + Unpin,
{
    // Read length prefix (4 bytes, big-endian)
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(FrameError::TooLarge { len, max: max_size });
    }

    buf.clear();
    buf.resize(len, 0);
    reader.read_exact(buf).await?;
    Ok(true)
}

/// Write one frame and flush.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_size: usize,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }
    if payload.len() > max_size {
        return Err(FrameError::TooLarge {
            len: payload.len(),
            max: max_size,
        });
    }

    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
