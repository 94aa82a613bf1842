//! The hello exchange that opens every session.
//!
//! The client announces protocol, version, and whether it expects the
//! channel to be encrypted; the server answers with its identity or rejects.
//! Compatibility rule: same major version, client minor >= server minor.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::CONTROL;
use crate::error::{Result, WireError};
use crate::framing::{FrameReader, FrameWriter};

const MAX_PROTOCOL_LEN: usize = 32;
const MAX_VERSION_LEN: usize = 16;
const MAX_SERVER_TYPE_LEN: usize = 256;
const MAX_UUID_LEN: usize = 64;

/// Client hello sent on the CONTROL channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloRequest {
    /// Protocol name. Must be `labwire`.
    pub protocol: String,
    /// Protocol version, `<major>.<minor>`.
    pub version: String,
    /// Whether the client established the channel under encryption.
    pub encrypted: bool,
}

/// Server hello answer sent on the CONTROL channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloResponse {
    /// Protocol name. Must match the request.
    pub protocol: String,
    /// Server protocol version.
    pub version: String,
    /// Advertised server type.
    pub server_type: String,
    /// Stable server instance identifier.
    pub server_uuid: String,
}

/// Configuration for the hello exchange.
#[derive(Debug, Clone)]
pub struct HelloConfig {
    /// Timeout for each blocking hello operation.
    pub timeout: Duration,
    /// Expected protocol name.
    pub protocol_name: String,
    /// Local protocol version.
    pub protocol_version: String,
    /// Maximum hello frame payload size in bytes.
    pub max_hello_payload: usize,
}

impl Default for HelloConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            protocol_name: "labwire".to_string(),
            protocol_version: "1.0".to_string(),
            max_hello_payload: 16 * 1024,
        }
    }
}

/// Perform the client side of the hello exchange.
pub fn hello_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    encrypted: bool,
    config: &HelloConfig,
) -> Result<HelloResponse> {
    validate_protocol_name(&config.protocol_name)?;
    validate_version(&config.protocol_version)?;

    let req = HelloRequest {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
        encrypted,
    };
    writer.send_json(CONTROL, &req)?;

    let deadline = Instant::now() + config.timeout;
    let payload = recv_control_payload(reader, deadline, config.timeout, config.max_hello_payload)?;
    let resp: HelloResponse = serde_json::from_slice(&payload)?;

    validate_protocol_name(&resp.protocol)?;
    validate_version(&resp.version)?;
    validate_len("server_type", &resp.server_type, MAX_SERVER_TYPE_LEN)?;
    validate_len("server_uuid", &resp.server_uuid, MAX_UUID_LEN)?;

    if resp.protocol != config.protocol_name {
        return Err(WireError::HelloFailed(format!(
            "unknown protocol '{}' (expected '{}')",
            resp.protocol, config.protocol_name
        )));
    }

    if !is_version_compatible(&config.protocol_version, &resp.version)? {
        return Err(WireError::HelloFailed(format!(
            "incompatible version '{}' (local '{}')",
            resp.version, config.protocol_version
        )));
    }

    debug!(
        server_type = %resp.server_type,
        server_uuid = %resp.server_uuid,
        version = %resp.version,
        "hello accepted"
    );
    Ok(resp)
}

/// Perform the server side of the hello exchange.
///
/// Verifies protocol, version, and that the client's security expectation
/// matches `encrypted`, then answers with the server identity. A mismatch
/// fails channel establishment before any feature traffic.
pub fn hello_server<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    server_type: &str,
    server_uuid: &str,
    encrypted: bool,
    config: &HelloConfig,
) -> Result<HelloRequest> {
    validate_protocol_name(&config.protocol_name)?;
    validate_version(&config.protocol_version)?;
    validate_len("server_type", server_type, MAX_SERVER_TYPE_LEN)?;
    validate_len("server_uuid", server_uuid, MAX_UUID_LEN)?;

    let deadline = Instant::now() + config.timeout;
    let payload = recv_control_payload(reader, deadline, config.timeout, config.max_hello_payload)?;
    let req: HelloRequest = serde_json::from_slice(&payload)?;

    validate_protocol_name(&req.protocol)?;
    validate_version(&req.version)?;

    if req.protocol != config.protocol_name {
        return Err(WireError::HelloFailed(format!(
            "unknown protocol '{}' (expected '{}')",
            req.protocol, config.protocol_name
        )));
    }

    if !is_version_compatible(&req.version, &config.protocol_version)? {
        return Err(WireError::HelloFailed(format!(
            "incompatible version '{}' (server '{}')",
            req.version, config.protocol_version
        )));
    }

    if req.encrypted != encrypted {
        return Err(WireError::HelloFailed(format!(
            "channel security mismatch (client encrypted={}, server encrypted={})",
            req.encrypted, encrypted
        )));
    }

    let resp = HelloResponse {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
        server_type: server_type.to_string(),
        server_uuid: server_uuid.to_string(),
    };
    writer.send_json(CONTROL, &resp)?;

    debug!(version = %req.version, encrypted = req.encrypted, "client hello accepted");
    Ok(req)
}

fn recv_control_payload<R: Read>(
    reader: &mut FrameReader<R>,
    deadline: Instant,
    timeout: Duration,
    max_hello_payload: usize,
) -> Result<Vec<u8>> {
    loop {
        if Instant::now() >= deadline {
            return Err(WireError::Timeout(timeout));
        }

        match reader.read_frame() {
            Ok(frame) => {
                if frame.channel != CONTROL {
                    return Err(WireError::HelloFailed(format!(
                        "expected CONTROL channel {}, got {}",
                        CONTROL, frame.channel
                    )));
                }
                if frame.payload.len() > max_hello_payload {
                    return Err(WireError::HelloFailed(format!(
                        "hello payload too large: {} (max {})",
                        frame.payload.len(),
                        max_hello_payload
                    )));
                }
                return Ok(frame.payload.to_vec());
            }
            Err(WireError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(WireError::ConnectionClosed) => {
                return Err(WireError::HelloFailed(
                    "connection closed during hello".to_string(),
                ));
            }
            Err(err) => return Err(err),
        }
    }
}

fn validate_protocol_name(protocol: &str) -> Result<()> {
    if protocol.is_empty() || protocol.len() > MAX_PROTOCOL_LEN {
        return Err(WireError::HelloFailed(format!(
            "invalid protocol name length: {}",
            protocol.len()
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version.len() > MAX_VERSION_LEN {
        return Err(WireError::HelloFailed(format!(
            "invalid protocol version length: {}",
            version.len()
        )));
    }
    let _ = parse_version(version)?;
    Ok(())
}

fn validate_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() || value.len() > max {
        return Err(WireError::HelloFailed(format!(
            "invalid {field} length: {}",
            value.len()
        )));
    }
    Ok(())
}

fn is_version_compatible(client_version: &str, server_version: &str) -> Result<bool> {
    let (client_major, client_minor) = parse_version(client_version)?;
    let (server_major, server_minor) = parse_version(server_version)?;

    Ok(client_major == server_major && client_minor >= server_minor)
}

fn parse_version(version: &str) -> Result<(u16, u16)> {
    let mut parts = version.split('.');

    let major = parts.next().ok_or_else(|| {
        WireError::HelloFailed(format!("invalid version '{version}': missing major"))
    })?;
    let minor = parts.next().ok_or_else(|| {
        WireError::HelloFailed(format!("invalid version '{version}': missing minor"))
    })?;

    if parts.next().is_some() {
        return Err(WireError::HelloFailed(format!(
            "invalid version '{version}': expected '<major>.<minor>'"
        )));
    }

    let major = major.parse::<u16>().map_err(|_| {
        WireError::HelloFailed(format!("invalid version '{version}': non-numeric major"))
    })?;
    let minor = minor.parse::<u16>().map_err(|_| {
        WireError::HelloFailed(format!("invalid version '{version}': non-numeric minor"))
    })?;

    Ok((major, minor))
}
