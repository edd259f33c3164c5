//! Length-prefixed frame I/O over a bidirectional byte stream.
//!
//! Every message is `len(LE u32) ‖ payload`. There is no framing checksum;
//! the underlying transport (a local stream channel) is trusted for
//! integrity. See docs/protocol.md before changing MAX_MESSAGE_SIZE — it is
//! part of the wire contract both peers must agree on per build.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum payload size in bytes, fixed per build.
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Errors that can arise reading or writing a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    #[error("message of {0} bytes exceeds MAX_MESSAGE_SIZE ({MAX_MESSAGE_SIZE})")]
    MessageTooLarge(u32),

    #[error("broken pipe: {0}")]
    BrokenPipe(#[source] std::io::Error),
}

impl FrameError {
    fn from_io(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => FrameError::UnexpectedEndOfStream,
            _ => FrameError::BrokenPipe(e),
        }
    }
}

/// Write one frame: a 4-byte little-endian length prefix followed by `payload`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| FrameError::MessageTooLarge(u32::MAX))?;
    if len > MAX_MESSAGE_SIZE {
        return Err(FrameError::MessageTooLarge(len));
    }
    writer
        .write_all(&len.to_le_bytes())
        .await
        .map_err(FrameError::from_io)?;
    writer
        .write_all(payload)
        .await
        .map_err(FrameError::from_io)?;
    writer.flush().await.map_err(FrameError::from_io)?;
    Ok(())
}

/// Read exactly one frame's payload, failing if the declared length exceeds
/// MAX_MESSAGE_SIZE or the stream ends early.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(FrameError::from_io)?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_MESSAGE_SIZE {
        return Err(FrameError::MessageTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(FrameError::from_io)?;
    Ok(payload)
}
