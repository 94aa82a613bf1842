//! A client session: one connection, one hello, then commands.

use std::time::{Duration, Instant};

use labwire_transport::{establish, ChannelStream, Security};
use labwire_wire::{
    hello_client, transport_to_wire_error, CommandCall, CommandReply, ControlMessage, Frame,
    FrameConfig, FrameReader, FrameWriter, HelloConfig, HelloResponse, ServerDescriptor,
    StructuredError, WireError, COMMAND, CONTROL, CONTROL_GOODBYE_ACK, FAULT, REPLY,
};
use tracing::{debug, warn};

use crate::error::{ClientError, InvokeError, Result};

/// Default wait for a command reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait for a control response.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for the goodbye acknowledgement on close.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// How often a blocked read rechecks its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct SessionIo {
    reader: FrameReader<ChannelStream>,
    writer: FrameWriter<ChannelStream>,
    control: ChannelStream,
    /// Responses still owed for commands whose wait timed out. The stream is
    /// ordered, so the next invocation discards this many responses before
    /// accepting one as its own.
    stale_responses: u32,
}

impl SessionIo {
    /// Read the next frame, polling so the deadline can cut the wait short.
    fn read_frame_until(&mut self, deadline: Instant, budget: Duration) -> Result<Frame> {
        loop {
            if Instant::now() >= deadline {
                return Err(ClientError::Wire(WireError::Timeout(budget)));
            }
            match self.reader.read_frame() {
                Ok(frame) => return Ok(frame),
                Err(WireError::Io(err))
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// An established session to a feature server.
///
/// Dropping the session releases it; [`close`](Session::close) does the same
/// with an explicit grace period and is idempotent.
pub struct Session {
    io: Option<SessionIo>,
    server: HelloResponse,
}

impl Session {
    /// Connect to a discovered server and perform the hello exchange.
    pub fn connect(descriptor: &ServerDescriptor, security: Security) -> Result<Self> {
        Self::connect_with(descriptor, security, &HelloConfig::default())
    }

    /// Connect with explicit hello settings.
    ///
    /// When the descriptor carries a UUID (it does when it came from a
    /// scan), the server answering the hello must be that server.
    pub fn connect_with(
        descriptor: &ServerDescriptor,
        security: Security,
        hello: &HelloConfig,
    ) -> Result<Self> {
        let stream = establish(&descriptor.host, descriptor.port, security)?;
        let control = stream.try_clone().map_err(transport_to_wire_error)?;
        let read_half = stream.try_clone().map_err(transport_to_wire_error)?;

        let config = FrameConfig {
            read_timeout: Some(POLL_INTERVAL),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_channel(read_half, config)?;
        let mut writer = FrameWriter::with_config_channel(stream, FrameConfig::default())?;

        let server = hello_client(&mut reader, &mut writer, security.is_encrypted(), hello)?;

        if !descriptor.uuid.is_empty() && descriptor.uuid != server.server_uuid {
            let _ = control.release();
            return Err(ClientError::ServerMismatch {
                expected: descriptor.uuid.clone(),
                got: server.server_uuid,
            });
        }

        debug!(
            server_type = %server.server_type,
            uuid = %server.server_uuid,
            "session established"
        );

        Ok(Self {
            io: Some(SessionIo {
                reader,
                writer,
                control,
                stale_responses: 0,
            }),
            server,
        })
    }

    /// Identity and type the server announced in its hello.
    pub fn server_info(&self) -> &HelloResponse {
        &self.server
    }

    /// Ask the server which features it implements.
    pub fn list_features(&mut self) -> Result<Vec<String>> {
        let io = self.io_mut()?;
        io.writer.send_json(CONTROL, &ControlMessage::list_features())?;

        let deadline = Instant::now() + DEFAULT_CONTROL_TIMEOUT;
        let frame = io.read_frame_until(deadline, DEFAULT_CONTROL_TIMEOUT)?;
        if frame.channel != CONTROL {
            return Err(ClientError::Protocol(format!(
                "expected CONTROL response, got channel {}",
                frame.channel
            )));
        }

        let message: ControlMessage = serde_json::from_slice(frame.payload.as_ref())?;
        message
            .features()
            .ok_or_else(|| ClientError::Protocol(format!("unexpected control message '{}'", message.msg_type)))
    }

    /// Invoke a command or read a property with the default reply timeout.
    pub fn invoke(&mut self, call: &CommandCall) -> std::result::Result<CommandReply, InvokeError> {
        self.invoke_with_timeout(call, DEFAULT_REPLY_TIMEOUT)
    }

    /// Invoke a command or read a property.
    ///
    /// A REPLY is the successful outcome; a FAULT decodes into the server's
    /// structured error. A FAULT payload that is not a structured error is a
    /// transport-class failure, never a fabricated one.
    ///
    /// A timed-out wait leaves the server's response in flight; when it
    /// eventually arrives it is discarded rather than mistaken for the
    /// answer to a later command.
    pub fn invoke_with_timeout(
        &mut self,
        call: &CommandCall,
        timeout: Duration,
    ) -> std::result::Result<CommandReply, InvokeError> {
        let io = self.io_mut()?;
        io.writer.send_json(COMMAND, call)?;

        let deadline = Instant::now() + timeout;
        let frame = loop {
            let frame = match io.read_frame_until(deadline, timeout) {
                Ok(frame) => frame,
                Err(err) => {
                    if matches!(err, ClientError::Wire(WireError::Timeout(_))) {
                        io.stale_responses += 1;
                    }
                    return Err(err.into());
                }
            };
            if io.stale_responses > 0 && (frame.channel == REPLY || frame.channel == FAULT) {
                io.stale_responses -= 1;
                debug!(
                    channel = frame.channel,
                    "discarding late response to a timed-out command"
                );
                continue;
            }
            break frame;
        };

        match frame.channel {
            REPLY => {
                let reply: CommandReply = serde_json::from_slice(frame.payload.as_ref())
                    .map_err(ClientError::Json)?;
                Ok(reply)
            }
            FAULT => match StructuredError::decode(frame.payload.as_ref()) {
                Some(fault) => Err(InvokeError::Fault(fault)),
                None => Err(InvokeError::Client(ClientError::NonConformingFault)),
            },
            other => Err(InvokeError::Client(ClientError::Protocol(format!(
                "unexpected channel {other} in response to a command"
            )))),
        }
    }

    /// Release the session: say goodbye, wait up to `grace` for the
    /// acknowledgement, then drop the connection. Idempotent.
    pub fn close(&mut self, grace: Duration) -> Result<()> {
        let Some(mut io) = self.io.take() else {
            return Ok(());
        };

        if let Err(err) = io.writer.send_json(CONTROL, &ControlMessage::goodbye()) {
            debug!(error = %err, "goodbye not sent, releasing anyway");
            let _ = io.control.release();
            return Ok(());
        }

        let deadline = Instant::now() + grace;
        loop {
            match io.read_frame_until(deadline, grace) {
                Ok(frame) if frame.channel == CONTROL => {
                    match serde_json::from_slice::<ControlMessage>(frame.payload.as_ref()) {
                        Ok(message) if message.msg_type == CONTROL_GOODBYE_ACK => {
                            debug!("session released");
                            break;
                        }
                        // Stale replies may still be in flight; skip them.
                        _ => continue,
                    }
                }
                Ok(_) => continue,
                Err(ClientError::Wire(WireError::ConnectionClosed)) => break,
                Err(err) => {
                    warn!(error = %err, "goodbye acknowledgement not received");
                    break;
                }
            }
        }

        let _ = io.control.release();
        Ok(())
    }

    fn io_mut(&mut self) -> Result<&mut SessionIo> {
        self.io.as_mut().ok_or(ClientError::Closed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close(Duration::from_millis(500));
    }
}
