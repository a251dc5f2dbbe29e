//! Length-prefixed framing for transports without a framing of their own.
//!
//! Frames are an unsigned-varint length followed by the canonical message
//! bytes. The limits differ by direction of use: requests stay small,
//! content frames may carry large transaction batches.

use crate::message::SyncMessage;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The largest frame accepted off the wire.
pub const MAX_FRAME_BYTES: usize = 10_000_000;

async fn read_length_prefixed<T: AsyncRead + Unpin + Send>(
    io: &mut T,
    max_len: usize,
) -> std::io::Result<Vec<u8>> {
    let mut len: u64 = 0;
    let mut shift = 0;

    loop {
        if shift >= 70 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Varint too long",
            ));
        }
        let mut byte = [0u8; 1];
        io.read_exact(&mut byte).await?;
        len |= ((byte[0] & 0x7f) as u64) << shift;
        shift += 7;
        if (byte[0] & 0x80) == 0 {
            break;
        }
    }

    if len > max_len as u64 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Frame too large",
        ));
    }

    let mut frame = vec![0u8; len as usize];
    io.read_exact(&mut frame).await?;
    Ok(frame)
}

async fn write_length_prefixed<T: AsyncWrite + Unpin + Send>(
    io: &mut T,
    data: &[u8],
) -> std::io::Result<()> {
    let mut len = data.len() as u64;
    let mut encoded_len = [0u8; 10];
    let mut i = 0;

    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        encoded_len[i] = byte;
        i += 1;
        if len == 0 {
            break;
        }
    }

    io.write_all(encoded_len.get(..i).unwrap_or_default()).await?;
    io.write_all(data).await?;
    Ok(())
}

/// Reads one framed message.
pub async fn read_message<T: AsyncRead + Unpin + Send>(
    io: &mut T,
) -> std::io::Result<SyncMessage> {
    let frame = read_length_prefixed(io, MAX_FRAME_BYTES).await?;
    SyncMessage::from_wire_bytes(&frame)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

/// Writes one framed message.
pub async fn write_message<T: AsyncWrite + Unpin + Send>(
    io: &mut T,
    message: &SyncMessage,
) -> std::io::Result<()> {
    let bytes = message
        .to_wire_bytes()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    write_length_prefixed(io, &bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use lattice_types::covalue::CoValueId;
    use lattice_types::known::CoValueKnownState;

    #[tokio::test]
    async fn framed_roundtrip() {
        let message = SyncMessage::Load(CoValueKnownState::empty(CoValueId([8u8; 32])));
        let mut buffer = Cursor::new(Vec::new());
        write_message(&mut buffer, &message).await.unwrap();
        write_message(&mut buffer, &message).await.unwrap();

        let mut reader = Cursor::new(buffer.into_inner());
        assert_eq!(read_message(&mut reader).await.unwrap(), message);
        assert_eq!(read_message(&mut reader).await.unwrap(), message);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        // A varint claiming a frame far over the limit.
        let bytes = vec![0xff, 0xff, 0xff, 0xff, 0x7f];
        let mut reader = Cursor::new(bytes);
        let err = read_message(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
