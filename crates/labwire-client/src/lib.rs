//! Client side of the labwire protocol.
//!
//! Discover a server by announcement scan, open a [`Session`] (connect plus
//! hello), list its features, and invoke commands. Server-side rejections
//! arrive as structured faults; everything below the feature layer is a
//! [`ClientError`].

pub mod discovery;
pub mod error;
pub mod session;

pub use discovery::{
    scan_for, scan_with, AnnouncementSource, UdpAnnouncementSource, DEFAULT_ANNOUNCE_PORT,
};
pub use error::{ClientError, InvokeError, Result};
pub use session::{Session, DEFAULT_CLOSE_GRACE, DEFAULT_CONTROL_TIMEOUT, DEFAULT_REPLY_TIMEOUT};
