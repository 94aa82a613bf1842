use std::path::PathBuf;

/// Errors that can occur while building or running a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] labwire_transport::TransportError),

    /// Wire-level error.
    #[error("wire error: {0}")]
    Wire(#[from] labwire_wire::WireError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A feature description is malformed.
    #[error("invalid feature description: {0}")]
    Description(String),

    /// Feature registration is inconsistent with its description.
    #[error("feature registration failed: {0}")]
    Registration(String),

    /// The server config file could not be read or written.
    #[error("config file {path}: {source}")]
    Config {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The discovery announcer could not be started.
    #[error("announcer failed: {0}")]
    Announce(std::io::Error),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
