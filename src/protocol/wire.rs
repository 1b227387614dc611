//! Wire format for message framing.
//!
//! Messages are length-prefixed: [4 bytes big-endian u32][JSON payload]

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{ProtocolErrorKind, ServerError};

/// Maximum frame size used when no limit is configured.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read one length-prefixed frame.
///
/// A clean EOF before the length prefix reports `ConnectionClosed`.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Vec<u8>, ServerError>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ServerError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            });
        }
        Err(e) => return Err(ServerError::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(ServerError::Protocol {
            kind: ProtocolErrorKind::MessageTooLarge {
                size: len,
                max: max_size,
            },
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    Ok(buf)
}

/// Write one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), ServerError>
where
    W: AsyncWriteExt + Unpin,
{
    let len = u32::try_from(data.len()).map_err(|_| ServerError::Protocol {
        kind: ProtocolErrorKind::MessageTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        },
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a frame and decode its JSON payload, giving up after `timeout_duration`.
pub async fn read_json<R, T>(
    reader: &mut R,
    max_size: usize,
    timeout_duration: Duration,
) -> Result<T, ServerError>
where
    R: AsyncReadExt + Unpin,
    T: DeserializeOwned,
{
    let frame = timeout(timeout_duration, read_frame(reader, max_size))
        .await
        .map_err(|_| ServerError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })??;

    serde_json::from_slice(&frame).map_err(|e| ServerError::Protocol {
        kind: ProtocolErrorKind::InvalidMessageFormat {
            message: format!("Invalid JSON: {}", e),
        },
    })
}

/// Encode a value as JSON and write it as one frame, giving up after `timeout_duration`.
pub async fn write_json<W, T>(
    writer: &mut W,
    value: &T,
    timeout_duration: Duration,
) -> Result<(), ServerError>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(value)?;
    timeout(timeout_duration, write_frame(writer, &bytes))
        .await
        .map_err(|_| ServerError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}
