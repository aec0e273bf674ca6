// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format encoding/decoding for the coordination protocol.
//!
//! Wire format: one JSON object per LF-terminated line, UTF-8. Line-oriented
//! framing keeps the protocol speakable from test-side bindings in any
//! language with a socket and a JSON encoder.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

use super::{Request, Response};

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Line too long: {size} bytes (max {max})")]
    LineTooLong { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Maximum line length (64 KiB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Default timeout for writing a response
pub const WRITE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Encode a message as a single JSON line (LF included).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut line = serde_json::to_vec(msg)?;
    if line.len() >= MAX_LINE_LENGTH {
        return Err(ProtocolError::LineTooLong {
            size: line.len(),
            max: MAX_LINE_LENGTH,
        });
    }
    line.push(b'\n');
    Ok(line)
}

/// Decode a message from one line (trailing newline tolerated).
pub fn decode<T: DeserializeOwned>(line: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(line)?)
}

/// Read one LF-terminated line from an async buffered reader.
///
/// Returns [`ProtocolError::ConnectionClosed`] on clean EOF before any
/// bytes, and [`ProtocolError::LineTooLong`] when the peer never sends a
/// newline within the size limit.
pub async fn read_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    let n = reader
        .take(MAX_LINE_LENGTH as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_LINE_LENGTH {
            return Err(ProtocolError::LineTooLong {
                size: buf.len(),
                max: MAX_LINE_LENGTH,
            });
        }
        // EOF in the middle of a line
        return Err(ProtocolError::ConnectionClosed);
    }
    buf.pop();
    Ok(buf)
}

/// Read the next request line.
pub async fn read_request<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
) -> Result<Request, ProtocolError> {
    let line = read_line(reader).await?;
    decode(&line)
}

/// Write a response line with timeout.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, async {
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_wire_tests.rs"]
mod tests;
