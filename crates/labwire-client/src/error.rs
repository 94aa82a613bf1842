use std::time::Duration;

use labwire_wire::StructuredError;

/// Errors that can occur on the client side of a session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] labwire_transport::TransportError),

    /// Wire-level error.
    #[error("wire error: {0}")]
    Wire(#[from] labwire_wire::WireError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The discovery socket could not be used.
    #[error("discovery socket error: {0}")]
    Discovery(std::io::Error),

    /// No matching server announced itself within the scan budget.
    #[error("no '{server_type}' server discovered within {budget:?}")]
    DiscoveryTimeout {
        server_type: String,
        budget: Duration,
    },

    /// The connected server is not the one the descriptor named.
    #[error("server identity mismatch: expected {expected}, got {got}")]
    ServerMismatch { expected: String, got: String },

    /// A FAULT payload that does not decode as a structured error.
    #[error("fault payload is not a structured error")]
    NonConformingFault,

    /// The peer violated the protocol in some other way.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The session was already closed.
    #[error("session is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Outcome of a command invocation.
///
/// A [`Fault`](InvokeError::Fault) is the server saying no; everything else
/// means the answer never (cleanly) arrived.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The server rejected or failed the invocation with a structured error.
    #[error("command fault: {0}")]
    Fault(StructuredError),

    /// The invocation failed below the feature layer.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl From<labwire_wire::WireError> for InvokeError {
    fn from(err: labwire_wire::WireError) -> Self {
        InvokeError::Client(ClientError::Wire(err))
    }
}
