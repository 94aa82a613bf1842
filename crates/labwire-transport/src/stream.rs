use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// Channel security mode.
///
/// `Encrypted` marks the channel as requiring the external cipher provider;
/// both ends verify agreement during the hello exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    #[default]
    Plaintext,
    Encrypted,
}

impl Security {
    /// True when the channel is marked encrypted.
    pub fn is_encrypted(self) -> bool {
        matches!(self, Security::Encrypted)
    }

    /// Construct from the wire-level `encrypted` flag.
    pub fn from_flag(encrypted: bool) -> Self {
        if encrypted {
            Security::Encrypted
        } else {
            Security::Plaintext
        }
    }
}

/// An established channel to a peer — implements Read + Write.
///
/// Wraps a TCP stream together with the security mode it was established
/// under. Cloning shares the underlying socket (separate file descriptor),
/// which is how one end reads and writes concurrently.
pub struct ChannelStream {
    inner: TcpStream,
    security: Security,
}

impl ChannelStream {
    pub(crate) fn new(inner: TcpStream, security: Security) -> Self {
        Self { inner, security }
    }

    /// Security mode this channel was established under.
    pub fn security(&self) -> Security {
        self.security
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this channel (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::new(cloned, self.security))
    }

    /// Shut down both directions of the channel.
    ///
    /// Releasing an already-released channel is not an error: the peer may
    /// have torn the connection down first.
    pub fn release(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => {
                debug!("channel released");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Read for ChannelStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for ChannelStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for ChannelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStream")
            .field("security", &self.security)
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}
