//! Length-prefixed framing over byte streams.
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   envelope JSON    |
//! | u32 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The prefix does not count itself. Zero-length frames are keepalive padding
//! and are skipped by [`read_frame`].

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Limits applied by the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest payload accepted or sent, in bytes.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1_048_576,
        }
    }
}

impl FrameConfig {
    /// Builds a config from a byte limit, saturating at `u32::MAX`.
    pub fn with_max_size(max: usize) -> Self {
        Self {
            max_payload_size: u32::try_from(max).unwrap_or(u32::MAX),
        }
    }

    fn check(&self, len: usize) -> Result<u32, FrameError> {
        match u32::try_from(len) {
            Ok(size) if size <= self.max_payload_size => Ok(size),
            _ => Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.max_payload_size,
            }),
        }
    }
}

/// Framing failures.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame is larger than [`FrameConfig::max_payload_size`].
    #[error("frame of {size} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Offending size.
        size: usize,
        /// Configured limit.
        max: u32,
    },

    /// The peer closed the stream before a complete frame arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Underlying stream error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn closed_on_eof(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Reads the next non-empty frame.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Vec<u8>, FrameError> {
    loop {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await.map_err(closed_on_eof)?;
        let len = u32::from_le_bytes(len_buf);
        if len == 0 {
            continue;
        }
        config.check(len as usize)?;

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await.map_err(closed_on_eof)?;
        return Ok(payload);
    }
}

/// Prefixes `payload` with its length into a single buffer.
pub fn encode_frame(payload: &[u8], config: &FrameConfig) -> Result<Vec<u8>, FrameError> {
    let len = config.check(payload.len())?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Writes one frame and flushes.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let frame = encode_frame(payload, config)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frames_arrive_in_order_without_merging() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::default();
        for msg in [&b"{\"a\":1}"[..], b"{\"b\":2}", b"{\"c\":3}"] {
            write_frame(&mut client, msg, &config).await.unwrap();
        }
        assert_eq!(read_frame(&mut server, &config).await.unwrap(), b"{\"a\":1}");
        assert_eq!(read_frame(&mut server, &config).await.unwrap(), b"{\"b\":2}");
        assert_eq!(read_frame(&mut server, &config).await.unwrap(), b"{\"c\":3}");
    }

    #[tokio::test]
    async fn test_small_buffer_forces_partial_reads() {
        let (mut client, mut server) = duplex(8);
        let config = FrameConfig::default();
        let payload = br#"{"payload":{"Ping":{"timestamp":12345}}}"#;

        let write_config = config.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut client, payload, &write_config).await.unwrap();
        });

        let received = read_frame(&mut server, &config).await.unwrap();
        writer.await.unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_keepalive_frames_are_skipped() {
        let (mut client, mut server) = duplex(8192);
        client.write_all(&0u32.to_le_bytes()).await.unwrap();
        client.write_all(&0u32.to_le_bytes()).await.unwrap();
        client.write_all(&5u32.to_le_bytes()).await.unwrap();
        client.write_all(b"hello").await.unwrap();

        let received = read_frame(&mut server, &FrameConfig::default()).await.unwrap();
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn test_oversized_frames_rejected_both_ways() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::with_max_size(16);

        let err = write_frame(&mut client, &[b'x'; 64], &config).await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 64, max: 16 }));

        client.write_all(&1024u32.to_le_bytes()).await.unwrap();
        let err = read_frame(&mut server, &config).await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_eof_reports_connection_closed() {
        let (mut client, mut server) = duplex(8192);
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let err = read_frame(&mut server, &FrameConfig::default()).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(b"hi", &FrameConfig::default()).unwrap();
        assert_eq!(frame, [2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn test_with_max_size_saturates() {
        assert_eq!(FrameConfig::with_max_size(usize::MAX).max_payload_size, u32::MAX);
    }
}
