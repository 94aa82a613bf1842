//! Wire layer of the labwire protocol.
//!
//! Every message travels as a length-prefixed frame on a numbered channel:
//! - A 2-byte magic number ("LW") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian channel ID
//!
//! Payloads are JSON. CONTROL carries the hello exchange and session
//! management, COMMAND carries invocations, REPLY successful responses, and
//! FAULT the structured error model defined in [`fault`].

pub mod channel;
pub mod codec;
pub mod error;
pub mod fault;
pub mod framing;
pub mod hello;
pub mod message;

pub use channel::{channel_name, COMMAND, CONTROL, FAULT, REPLY};
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{Result, WireError};
pub use fault::StructuredError;
pub use framing::{transport_to_wire_error, FrameReader, FrameWriter};
pub use hello::{hello_client, hello_server, HelloConfig, HelloRequest, HelloResponse};
pub use message::{
    Announcement, CommandCall, CommandReply, ControlMessage, ParamMap, ServerDescriptor,
    CONTROL_FEATURE_LIST, CONTROL_GOODBYE, CONTROL_GOODBYE_ACK, CONTROL_LIST_FEATURES,
};
