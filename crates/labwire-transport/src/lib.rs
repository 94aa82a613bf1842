//! TCP channel provider for labwire.
//!
//! Supplies the `establish(host, port, security)` / bind-accept surface the
//! rest of the stack builds on. The [`Security`] toggle travels with every
//! stream and is checked during the hello exchange one layer up; the cipher
//! layer itself is delegated to an external provider.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::{ChannelStream, Security};
pub use tcp::{establish, TcpChannelListener};
