//! Channel IDs used by the labwire protocol.

/// Session management: hello exchange, feature listing, goodbye.
pub const CONTROL: u16 = 0;

/// Command invocations (client to server).
pub const COMMAND: u16 = 1;

/// Successful command responses (server to client).
pub const REPLY: u16 = 2;

/// Structured errors (server to client).
pub const FAULT: u16 = 3;

/// Returns a human-readable name for a channel ID.
pub fn channel_name(id: u16) -> &'static str {
    match id {
        CONTROL => "CONTROL",
        COMMAND => "COMMAND",
        REPLY => "REPLY",
        FAULT => "FAULT",
        _ => "UNKNOWN",
    }
}
