//! Server side of the labwire protocol.
//!
//! A server is a [`FeatureRegistry`] (static interface descriptions plus
//! handler functions, populated once) behind a TCP accept loop. Each
//! connection gets its own worker; requests are validated against the
//! feature description before any handler effect, and every failure crossing
//! the service boundary is a structured error — a failed invocation never
//! takes the process down.

pub mod announce;
pub mod config;
pub mod description;
pub mod error;
pub mod features;
pub mod registry;
pub mod server;

pub use config::ServerConfig;
pub use description::{CommandDescription, CommandKind, FeatureDescription, ParameterDescription};
pub use error::{Result, ServerError};
pub use registry::{Feature, FeatureRegistry, Handler};
pub use server::{DiscoveryOptions, Server, ServerHandle, ServerOptions};
