use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::{ChannelStream, Security};

/// TCP listener for inbound channels.
///
/// Every accepted stream carries the listener's security mode; the hello
/// exchange one layer up rejects clients that disagree.
pub struct TcpChannelListener {
    listener: TcpListener,
    security: Security,
}

impl TcpChannelListener {
    /// Bind and listen on the given address. Port 0 requests an
    /// OS-assigned port; use [`local_port`](Self::local_port) to read it back.
    pub fn bind(host: &str, port: u16, security: Security) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr).map_err(|source| TransportError::Bind {
            addr: addr.clone(),
            source,
        })?;

        info!(%addr, ?security, "listening for channels");

        Ok(Self { listener, security })
    }

    /// Accept an incoming channel (blocking).
    pub fn accept(&self) -> Result<ChannelStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted channel");
        Ok(ChannelStream::new(stream, self.security))
    }

    /// Port the listener is bound to.
    pub fn local_port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Security mode applied to accepted channels.
    pub fn security(&self) -> Security {
        self.security
    }
}

/// Establish a channel to a listening server (blocking).
pub fn establish(host: &str, port: u16, security: Security) -> Result<ChannelStream> {
    let addr = (host, port);
    let mut last_err = None;
    let resolved = addr.to_socket_addrs().map_err(|source| TransportError::Connect {
        host: host.to_string(),
        port,
        source,
    })?;

    for candidate in resolved {
        match TcpStream::connect(candidate) {
            Ok(stream) => {
                debug!(%candidate, ?security, "channel established");
                return Ok(ChannelStream::new(stream, security));
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(TransportError::Connect {
        host: host.to_string(),
        port,
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing")
        }),
    })
}
