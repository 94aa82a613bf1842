use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};

/// Frame header: magic (2) + length (4) + channel (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "LW" (0x4C 0x57).
pub const MAGIC: [u8; 2] = [0x4C, 0x57];

/// Default maximum payload size: 1 MiB. Command payloads are small JSON
/// documents; anything bigger is a protocol violation.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// A framed message with channel routing.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The channel this message belongs to.
    pub channel: u16,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }
}

/// Encode a frame into the wire format: magic, length (LE), channel (LE),
/// then the payload bytes.
pub fn encode_frame(channel: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(WireError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_u16_le(channel);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(WireError::InvalidMagic);
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&src[2..6]);
    let payload_len = u32::from_le_bytes(len_bytes) as usize;

    let mut channel_bytes = [0u8; 2];
    channel_bytes.copy_from_slice(&src[6..8]);
    let channel = u16::from_le_bytes(channel_bytes);

    if payload_len > max_payload {
        return Err(WireError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { channel, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = br#"{"feature":"x"}"#;

        encode_frame(crate::COMMAND, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.channel, crate::COMMAND);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&MAGIC[..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"partial", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 3);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0, 0, 0, 0, 0, 0][..]);
        assert!(matches!(
            decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD),
            Err(WireError::InvalidMagic)
        ));
    }

    #[test]
    fn decode_rejects_oversized_payload() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(4 * 1024 * 1024);
        buf.put_u16_le(1);

        assert!(matches!(
            decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD),
            Err(WireError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn decode_multiple_frames_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(crate::COMMAND, b"call", &mut buf).unwrap();
        encode_frame(crate::REPLY, b"reply", &mut buf).unwrap();

        let first = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let second = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!((first.channel, first.payload.as_ref()), (crate::COMMAND, b"call".as_ref()));
        assert_eq!((second.channel, second.payload.as_ref()), (crate::REPLY, b"reply".as_ref()));
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload_is_valid() {
        let mut buf = BytesMut::new();
        encode_frame(crate::CONTROL, b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.channel, crate::CONTROL);
        assert!(frame.payload.is_empty());
    }
}
