//! The TCP server: accept loop, per-connection workers, lifecycle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use labwire_transport::{establish, ChannelStream, Security, TcpChannelListener};
use labwire_wire::{
    hello_server, transport_to_wire_error, ControlMessage, FrameConfig, FrameReader, FrameWriter,
    HelloConfig, StructuredError, WireError, COMMAND, CONTROL, CONTROL_GOODBYE,
    CONTROL_LIST_FEATURES, FAULT, REPLY,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::announce::{Announcer, DEFAULT_ANNOUNCE_ADDR, DEFAULT_ANNOUNCE_INTERVAL};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::registry::FeatureRegistry;

/// How often a blocked worker or accept loop rechecks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Discovery announcement settings.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Destination address for announcement datagrams.
    pub announce_addr: String,
    /// Interval between announcements.
    pub interval: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            announce_addr: DEFAULT_ANNOUNCE_ADDR.to_string(),
            interval: DEFAULT_ANNOUNCE_INTERVAL,
        }
    }
}

/// Server start-up options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Advertised server type, matched literally by discovering clients.
    pub server_type: String,
    /// Interface to listen on.
    pub bind_host: String,
    /// Command port; 0 requests an OS-assigned port.
    pub port: u16,
    /// Channel security mode. Clients whose hello disagrees are rejected.
    pub security: Security,
    /// Where the persisted identity lives. `None` mints a fresh identity
    /// that is not written anywhere.
    pub config_path: Option<PathBuf>,
    /// Discovery announcements, if any.
    pub discovery: Option<DiscoveryOptions>,
    /// Hello exchange settings.
    pub hello: HelloConfig,
    /// How long [`ServerHandle::stop`] waits for the accept loop to exit.
    pub shutdown_grace: Duration,
}

impl ServerOptions {
    pub fn new(server_type: impl Into<String>) -> Self {
        Self {
            server_type: server_type.into(),
            bind_host: "0.0.0.0".to_string(),
            port: 0,
            security: Security::Plaintext,
            config_path: None,
            discovery: None,
            hello: HelloConfig::default(),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// A feature server. Construct with [`Server::start`].
pub struct Server;

impl Server {
    /// Bind, start accepting connections, and (optionally) start announcing.
    ///
    /// The registry is frozen here; features cannot be added to a running
    /// server.
    pub fn start(registry: FeatureRegistry, options: ServerOptions) -> Result<ServerHandle> {
        let config = match &options.config_path {
            Some(path) => ServerConfig::load_or_create(path)?,
            None => ServerConfig::generate(),
        };

        let listener = TcpChannelListener::bind(&options.bind_host, options.port, options.security)?;
        let port = listener.local_port()?;

        info!(
            server_type = %options.server_type,
            %port,
            uuid = %config.uuid,
            security = ?options.security,
            "server started"
        );

        let announcer = match &options.discovery {
            Some(discovery) => Some(Announcer::start(
                &options.server_type,
                port,
                config.uuid,
                &discovery.announce_addr,
                discovery.interval,
            )?),
            None => None,
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let registry = Arc::new(registry);
        let (done_tx, done_rx) = mpsc::channel();

        let accept_worker = {
            let shutdown = shutdown.clone();
            let registry = registry.clone();
            let server_type = options.server_type.clone();
            let uuid = config.uuid.to_string();
            let hello = options.hello.clone();
            let security = options.security;
            thread::Builder::new()
                .name("labwire-accept".to_string())
                .spawn(move || {
                    accept_loop(
                        listener,
                        registry,
                        shutdown,
                        server_type,
                        uuid,
                        security,
                        hello,
                        done_tx,
                    );
                })
                .map_err(crate::error::ServerError::Spawn)?
        };

        // A wildcard bind is reachable through loopback; a specific
        // interface is only reachable through itself.
        let wake_host = match options.bind_host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1".to_string(),
            host => host.to_string(),
        };

        Ok(ServerHandle {
            port,
            uuid: config.uuid,
            security: options.security,
            wake_host,
            shutdown,
            done_rx,
            accept_worker: Some(accept_worker),
            announcer,
            grace: options.shutdown_grace,
        })
    }
}

/// Handle to a running server. Stops the server on [`stop`](Self::stop) or
/// drop.
pub struct ServerHandle {
    port: u16,
    uuid: Uuid,
    security: Security,
    wake_host: String,
    shutdown: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    accept_worker: Option<JoinHandle<()>>,
    announcer: Option<Announcer>,
    grace: Duration,
}

impl ServerHandle {
    /// Port the server is accepting connections on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The server's stable identity.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Stop announcing and accepting, then wait up to the shutdown grace for
    /// the accept loop to exit. Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.accept_worker.take() else {
            return;
        };

        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(announcer) = self.announcer.as_mut() {
            announcer.stop();
        }

        // Wake the blocking accept with a throwaway connection.
        let wake = establish(&self.wake_host, self.port, self.security)
            .or_else(|_| establish("127.0.0.1", self.port, self.security));
        if let Ok(stream) = wake {
            let _ = stream.release();
        }

        match self.done_rx.recv_timeout(self.grace) {
            Ok(()) => {
                let _ = worker.join();
                info!(port = %self.port, "server stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(port = %self.port, grace = ?self.grace, "accept loop did not stop in time");
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn accept_loop(
    listener: TcpChannelListener,
    registry: Arc<FeatureRegistry>,
    shutdown: Arc<AtomicBool>,
    server_type: String,
    uuid: String,
    security: Security,
    hello: HelloConfig,
    done_tx: Sender<()>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let stream = match listener.accept() {
            Ok(stream) => stream,
            Err(err) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %err, "accept failed");
                continue;
            }
        };

        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let registry = registry.clone();
        let shutdown = shutdown.clone();
        let server_type = server_type.clone();
        let uuid = uuid.clone();
        let hello = hello.clone();
        let spawned = thread::Builder::new()
            .name("labwire-conn".to_string())
            .spawn(move || {
                if let Err(err) =
                    serve_connection(stream, &registry, &shutdown, &server_type, &uuid, security, &hello)
                {
                    debug!(error = %err, "connection ended with error");
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn connection worker");
        }
    }

    let _ = done_tx.send(());
}

fn serve_connection(
    stream: ChannelStream,
    registry: &FeatureRegistry,
    shutdown: &AtomicBool,
    server_type: &str,
    uuid: &str,
    security: Security,
    hello: &HelloConfig,
) -> std::result::Result<(), WireError> {
    let peer = stream.peer_addr().map_err(transport_to_wire_error)?;
    debug!(%peer, "connection opened");

    let read_half = stream.try_clone().map_err(transport_to_wire_error)?;
    let config = FrameConfig {
        read_timeout: Some(POLL_INTERVAL),
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config_channel(read_half, config)?;
    let mut writer = FrameWriter::with_config_channel(stream, FrameConfig::default())?;

    hello_server(
        &mut reader,
        &mut writer,
        server_type,
        uuid,
        security.is_encrypted(),
        hello,
    )?;
    debug!(%peer, "hello complete");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            debug!(%peer, "closing connection on shutdown");
            return Ok(());
        }

        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(WireError::Io(err))
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(WireError::ConnectionClosed) => {
                debug!(%peer, "peer closed connection");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match frame.channel {
            CONTROL => {
                let message: ControlMessage = serde_json::from_slice(frame.payload.as_ref())?;
                match message.msg_type.as_str() {
                    CONTROL_LIST_FEATURES => {
                        let features = registry.feature_identifiers();
                        writer.send_json(CONTROL, &ControlMessage::feature_list(&features))?;
                    }
                    CONTROL_GOODBYE => {
                        writer.send_json(CONTROL, &ControlMessage::goodbye_ack())?;
                        debug!(%peer, "session released");
                        return Ok(());
                    }
                    other => {
                        warn!(%peer, msg_type = %other, "ignoring unknown control message");
                    }
                }
            }
            COMMAND => {
                let fault = match serde_json::from_slice(frame.payload.as_ref()) {
                    Ok(call) => match registry.dispatch(&call) {
                        Ok(reply) => {
                            writer.send_json(REPLY, &reply)?;
                            continue;
                        }
                        Err(fault) => fault,
                    },
                    Err(err) => {
                        StructuredError::framework(format!("malformed command call: {err}"))
                    }
                };
                writer.send(FAULT, &fault.encode()?)?;
            }
            other => {
                warn!(%peer, channel = %other, "frame on unexpected channel");
                let fault =
                    StructuredError::framework(format!("unexpected channel {other}"));
                writer.send(FAULT, &fault.encode()?)?;
            }
        }
    }
}
