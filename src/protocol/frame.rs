//! Length-prefixed JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the big-endian length header.
pub const HEADER_LEN: usize = 4;

/// Hard ceiling on a frame payload (50 MiB).
pub const MAX_FRAME_LEN: usize = 50 * 1024 * 1024;

/// Errors produced while framing or unframing a message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The buffer does not hold a complete frame.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The declared (or encoded) payload length is above the ceiling.
    #[error("Message too large: {length} bytes (limit {limit})")]
    OversizedMessage { length: usize, limit: usize },

    /// The peer closed the stream before the frame was complete.
    #[error("Stream closed after {received} of {expected} bytes")]
    TruncatedStream { expected: usize, received: usize },

    /// The payload is not valid UTF-8 JSON for the expected type.
    #[error("Invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::MalformedFrame(_) => "malformed",
            ProtocolError::OversizedMessage { .. } => "oversized",
            ProtocolError::TruncatedStream { .. } => "truncated",
            ProtocolError::Json(_) => "json",
            ProtocolError::Io(_) => "io",
        }
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Serialize `message` and prefix it with its byte length.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> ProtocolResult<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::OversizedMessage {
            length: payload.len(),
            limit: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one frame from a complete buffer.
///
/// Bytes after the declared payload are ignored.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::MalformedFrame(format!(
            "need {} header bytes, got {}",
            HEADER_LEN,
            data.len()
        )));
    }

    let length = declared_length(&data[..HEADER_LEN]);
    check_length(length)?;

    let payload = &data[HEADER_LEN..];
    if payload.len() < length {
        return Err(ProtocolError::MalformedFrame(format!(
            "declared {} payload bytes, buffer holds {}",
            length,
            payload.len()
        )));
    }

    Ok(serde_json::from_slice(&payload[..length])?)
}

/// Read exactly one frame from `reader`.
pub async fn receive<R, T>(reader: &mut R) -> ProtocolResult<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    receive_optional(reader)
        .await?
        .ok_or(ProtocolError::TruncatedStream {
            expected: HEADER_LEN,
            received: 0,
        })
}

/// Read one frame, or `None` if the peer closed before sending anything.
pub async fn receive_optional<R, T>(reader: &mut R) -> ProtocolResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; HEADER_LEN];
    let got = read_full(reader, &mut header).await?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_LEN {
        return Err(ProtocolError::TruncatedStream {
            expected: HEADER_LEN,
            received: got,
        });
    }

    let length = declared_length(&header);
    // Reject before allocating or reading the payload.
    check_length(length)?;

    let mut payload = vec![0u8; length];
    let got = read_full(reader, &mut payload).await?;
    if got < length {
        return Err(ProtocolError::TruncatedStream {
            expected: length,
            received: got,
        });
    }

    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Encode `message` and write the whole frame to `writer`.
pub async fn send<W, T>(writer: &mut W, message: &T) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

fn declared_length(header: &[u8]) -> usize {
    u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize
}

fn check_length(length: usize) -> ProtocolResult<()> {
    if length > MAX_FRAME_LEN {
        return Err(ProtocolError::OversizedMessage {
            length,
            limit: MAX_FRAME_LEN,
        });
    }
    Ok(())
}

/// Fill `buf` until it is full or the reader hits EOF. Returns bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
