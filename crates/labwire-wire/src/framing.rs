use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::BytesMut;
use labwire_transport::ChannelStream;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig};
use crate::error::{Result, WireError};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(WireError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                return Err(WireError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next frame and require it to arrive on `channel`.
    pub fn read_frame_on(&mut self, channel: u16) -> Result<Frame> {
        let frame = self.read_frame()?;
        if frame.channel != channel {
            return Err(WireError::UnexpectedChannel {
                expected: channel,
                got: frame.channel,
            });
        }
        Ok(frame)
    }

    /// Read a frame on `channel` and deserialize its JSON payload.
    pub fn read_json_on<M: DeserializeOwned>(&mut self, channel: u16) -> Result<M> {
        let frame = self.read_frame_on(channel)?;
        Ok(serde_json::from_slice(frame.payload.as_ref())?)
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }
}

impl FrameReader<ChannelStream> {
    /// Create a frame reader over a channel stream, applying the read
    /// timeout from config to the underlying socket.
    pub fn with_config_channel(inner: ChannelStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_wire_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Replace the socket read timeout for subsequent reads.
    pub fn set_read_timeout(&mut self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.config.read_timeout = timeout;
        self.inner
            .set_read_timeout(timeout)
            .map_err(transport_to_wire_error)
    }
}

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a payload on a channel (blocking, flushed).
    pub fn send(&mut self, channel: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(WireError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(channel, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_write_stall(&err) => return Err(self.write_timeout_error()),
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_write_stall(&err) => return Err(self.write_timeout_error()),
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    fn write_timeout_error(&self) -> WireError {
        WireError::Timeout(self.config.write_timeout.unwrap_or(Duration::ZERO))
    }

    /// Serialize a value to JSON and send it on a channel.
    pub fn send_json<M: Serialize>(&mut self, channel: u16, value: &M) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.send(channel, &payload)
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }
}

impl FrameWriter<ChannelStream> {
    /// Create a frame writer over a channel stream, applying the write
    /// timeout from config to the underlying socket.
    pub fn with_config_channel(inner: ChannelStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_wire_error)?;
        Ok(Self::with_config(inner, config))
    }
}

// A socket write timeout surfaces as WouldBlock on Unix, TimedOut on
// Windows. The write already blocked for the full budget, so stalling is
// final, not retryable.
fn is_write_stall(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut
}

/// Fold a transport error into the wire error space.
pub fn transport_to_wire_error(err: labwire_transport::TransportError) -> WireError {
    match err {
        labwire_transport::TransportError::Io(io)
        | labwire_transport::TransportError::Accept(io) => WireError::Io(io),
        labwire_transport::TransportError::Bind { source, .. }
        | labwire_transport::TransportError::Connect { source, .. } => WireError::Io(source),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::codec::{encode_frame, DEFAULT_MAX_PAYLOAD, MAGIC};
    use crate::{COMMAND, REPLY};

    #[test]
    fn reader_reassembles_partial_reads() {
        let mut wire = BytesMut::new();
        encode_frame(COMMAND, b"drip", &mut wire).unwrap();

        let mut reader = FrameReader::new(OneByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        });

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.channel, COMMAND);
        assert_eq!(frame.payload.as_ref(), b"drip");
    }

    #[test]
    fn reader_reports_clean_eof() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_frame(),
            Err(WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn reader_reports_eof_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u32_le(32);
        partial.put_u16_le(COMMAND);
        partial.put_slice(b"short");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_frame_on_rejects_wrong_channel() {
        let mut wire = BytesMut::new();
        encode_frame(REPLY, b"{}", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let err = reader.read_frame_on(COMMAND).unwrap_err();
        assert!(matches!(
            err,
            WireError::UnexpectedChannel {
                expected: COMMAND,
                got: REPLY
            }
        ));
    }

    #[test]
    fn writer_respects_max_payload() {
        let cfg = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), cfg);
        let err = writer.send(COMMAND, &[0u8; 16]).unwrap_err();
        assert!(matches!(err, WireError::PayloadTooLarge { .. }));
    }

    #[test]
    fn json_roundtrip_over_pipe() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Probe {
            label: String,
            value: u32,
        }

        let mut wire = Vec::new();
        {
            let mut writer = FrameWriter::new(Cursor::new(&mut wire));
            writer
                .send_json(
                    REPLY,
                    &Probe {
                        label: "ok".into(),
                        value: 7,
                    },
                )
                .unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(wire));
        let probe: Probe = reader.read_json_on(REPLY).unwrap();
        assert_eq!(
            probe,
            Probe {
                label: "ok".into(),
                value: 7
            }
        );
    }

    #[test]
    fn oversized_frame_in_stream_rejected() {
        let mut wire = BytesMut::new();
        wire.put_slice(&MAGIC);
        wire.put_u32_le(DEFAULT_MAX_PAYLOAD as u32 + 1);
        wire.put_u16_le(COMMAND);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(WireError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn stalled_writer_times_out_instead_of_spinning() {
        let cfg = FrameConfig {
            write_timeout: Some(Duration::from_millis(50)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(StalledWriter, cfg);

        let err = writer.send(COMMAND, b"{}").unwrap_err();
        assert!(matches!(err, WireError::Timeout(d) if d == Duration::from_millis(50)));
    }

    struct StalledWriter;

    impl Write for StalledWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct OneByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for OneByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }
}
