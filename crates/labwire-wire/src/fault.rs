//! The structured error model.
//!
//! A [`StructuredError`] is a typed, decodable failure value that crosses the
//! service boundary on the FAULT channel. It is distinct from transport
//! faults: a payload that does not conform to the scheme decodes to `None`,
//! and callers must treat that as an uninterpreted transport fault rather
//! than coerce it into a variant.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A structured error, exactly one variant per instance.
///
/// Immutable value object; equality is field equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredError {
    /// The caller supplied invalid or missing input. Recoverable by
    /// correcting the named parameter; never fatal to the server.
    #[error("validation error on parameter '{parameter}': {message} ({hint})")]
    Validation {
        parameter: String,
        message: String,
        hint: String,
    },

    /// A handler-internal failure not attributable to a single parameter.
    #[error("undefined execution error: {message}")]
    UndefinedExecution { message: String },

    /// A protocol-level fault signaled by the framework itself, such as a
    /// malformed request or an unimplemented feature.
    #[error("framework error: {message}")]
    Framework { message: String },
}

impl StructuredError {
    /// A validation error naming the offending parameter.
    ///
    /// All three fields must be non-empty; the hint should describe a
    /// concrete corrective action.
    pub fn validation(
        parameter: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// A handler-internal execution error.
    pub fn undefined_execution(message: impl Into<String>) -> Self {
        Self::UndefinedExecution {
            message: message.into(),
        }
    }

    /// A framework-level protocol fault.
    pub fn framework(message: impl Into<String>) -> Self {
        Self::Framework {
            message: message.into(),
        }
    }

    /// True when every field the variant requires is non-empty.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Validation {
                parameter,
                message,
                hint,
            } => !parameter.is_empty() && !message.is_empty() && !hint.is_empty(),
            Self::UndefinedExecution { message } | Self::Framework { message } => {
                !message.is_empty()
            }
        }
    }

    /// Encode to the wire representation carried on the FAULT channel.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a FAULT payload.
    ///
    /// Returns `None` for anything that does not conform to the structured
    /// scheme — invalid JSON, an unknown kind, or empty mandatory fields.
    /// `None` means the failure is an uninterpreted transport fault.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let decoded: Self = serde_json::from_slice(payload).ok()?;
        decoded.is_well_formed().then_some(decoded)
    }
}
