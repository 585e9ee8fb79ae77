//! Error types and error code constants for docgraph.
//!
//! This module provides a unified error type (`DocgraphError`) that bridges
//! domain-specific errors from the subsystems (conversion, routing,
//! serialization) into a common format suitable for JSON output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Conversion errors (structural errors while building the graph)
//! - `4`: Routing errors (URL lookups for unrouted reflections)
//! - `5`: Output errors (serialization or writing failed)
//! - `10`: Internal errors (bugs, unexpected state)
//!
//! ## Design
//!
//! - **Unified type**: `DocgraphError` is the single error type for CLI output
//! - **Bridging**: `impl From<X> for DocgraphError` bridges domain errors
//! - **Code mapping**: `OutputErrorCode` provides stable integer codes for JSON

use std::fmt;

use thiserror::Error;

use crate::converter::ConvertError;
use crate::router::RouterError;
use crate::serialization::SerializationError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed program dump).
    InvalidArguments = 2,
    /// Structural errors while converting the program.
    ConversionError = 3,
    /// Router misuse (URL requested for an unrouted reflection).
    RoutingError = 4,
    /// Serialization or output writing failed.
    OutputError = 5,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum DocgraphError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Structural error raised by the conversion pipeline.
    #[error("conversion error: {message}")]
    Conversion { message: String },

    /// A URL was requested for a reflection the router never assigned.
    #[error("routing error: {message}")]
    Routing { message: String },

    /// Writing an output failed.
    #[error("output error: {message}")]
    Output {
        message: String,
        path: Option<String>,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&DocgraphError> for OutputErrorCode {
    fn from(err: &DocgraphError) -> Self {
        match err {
            DocgraphError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            DocgraphError::Conversion { .. } => OutputErrorCode::ConversionError,
            DocgraphError::Routing { .. } => OutputErrorCode::RoutingError,
            DocgraphError::Output { .. } => OutputErrorCode::OutputError,
            DocgraphError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<DocgraphError> for OutputErrorCode {
    fn from(err: DocgraphError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges: domain errors -> DocgraphError
// ============================================================================

impl From<ConvertError> for DocgraphError {
    fn from(err: ConvertError) -> Self {
        DocgraphError::Conversion {
            message: err.to_string(),
        }
    }
}

impl From<RouterError> for DocgraphError {
    fn from(err: RouterError) -> Self {
        DocgraphError::Routing {
            message: err.to_string(),
        }
    }
}

impl From<SerializationError> for DocgraphError {
    fn from(err: SerializationError) -> Self {
        match err {
            SerializationError::Json(json_err) => DocgraphError::InvalidArguments {
                message: format!("JSON error: {}", json_err),
            },
            other => DocgraphError::Output {
                message: other.to_string(),
                path: None,
            },
        }
    }
}

impl From<std::io::Error> for DocgraphError {
    fn from(err: std::io::Error) -> Self {
        DocgraphError::InternalError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for DocgraphError {
    fn from(err: serde_json::Error) -> Self {
        DocgraphError::InvalidArguments {
            message: format!("JSON error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl DocgraphError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        DocgraphError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an output error for a specific path.
    pub fn output(message: impl Into<String>, path: impl Into<String>) -> Self {
        DocgraphError::Output {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        DocgraphError::InternalError {
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReflectionId;

    #[test]
    fn codes_are_stable() {
        assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
        assert_eq!(OutputErrorCode::ConversionError.code(), 3);
        assert_eq!(OutputErrorCode::RoutingError.code(), 4);
        assert_eq!(OutputErrorCode::OutputError.code(), 5);
        assert_eq!(OutputErrorCode::InternalError.code(), 10);
    }

    #[test]
    fn convert_error_bridges_to_conversion_code() {
        let err: DocgraphError = ConvertError::MissingReflection {
            id: ReflectionId::new(7),
        }
        .into();
        assert_eq!(OutputErrorCode::from(&err), OutputErrorCode::ConversionError);
        assert!(err.to_string().contains("7"));
    }

    #[test]
    fn router_error_bridges_to_routing_code() {
        let err: DocgraphError = RouterError::NoUrl {
            name: "Shape.area".to_string(),
        }
        .into();
        assert_eq!(OutputErrorCode::from(&err), OutputErrorCode::RoutingError);
        assert!(err.to_string().contains("Shape.area"));
    }
}
