//! Feature-based lab instrument control protocol over TCP.
//!
//! labwire lets a server expose *features* — named groups of commands and
//! read-only properties — and lets clients discover that server on the local
//! network, connect, and invoke them. Rejections travel as structured errors
//! a client can act on.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP channel establishment and the security mode
//! - [`wire`] — Frames, the hello exchange, messages, and structured faults
//! - [`server`] — Feature registry, dispatch, and the server runtime
//! - [`client`] — Discovery scans and client sessions

/// Re-export transport types.
pub mod transport {
    pub use labwire_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use labwire_wire::*;
}

/// Re-export server types.
pub mod server {
    pub use labwire_server::*;
}

/// Re-export client types.
pub mod client {
    pub use labwire_client::*;
}
