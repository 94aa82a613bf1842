use std::fmt;
use std::io;

use labwire_client::{ClientError, InvokeError};
use labwire_server::ServerError;
use labwire_transport::TransportError;
use labwire_wire::{StructuredError, WireError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    match err {
        WireError::Io(source) => io_error(context, source),
        WireError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        WireError::PayloadTooLarge { .. } | WireError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        WireError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Wire(err) => wire_error(context, err),
        ClientError::Json(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ClientError::Discovery(source) => io_error(context, source),
        ClientError::DiscoveryTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Transport(err) => transport_error(context, err),
        ServerError::Wire(err) => wire_error(context, err),
        ServerError::Json(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        err @ ServerError::Config { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

/// A structured fault is the server's answer, not a client malfunction:
/// validation rejections exit as invalid data, execution failures as plain
/// failure.
pub fn fault_error(fault: StructuredError) -> CliError {
    let code = match &fault {
        StructuredError::Validation { .. } => DATA_INVALID,
        StructuredError::UndefinedExecution { .. } | StructuredError::Framework { .. } => FAILURE,
    };
    CliError::new(code, format!("server fault: {fault}"))
}

pub fn invoke_error(context: &str, err: InvokeError) -> CliError {
    match err {
        InvokeError::Fault(fault) => fault_error(fault),
        InvokeError::Client(err) => client_error(context, err),
    }
}
