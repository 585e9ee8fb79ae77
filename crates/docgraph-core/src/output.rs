//! JSON output types for CLI responses and diagnostics.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (field order, array ordering)
//! 3. **Nullable vs absent:** Absent field means "not applicable"
//! 4. **Versioned:** Schema version in response enables forward compatibility

use std::io::{self, Write};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{DocgraphError, OutputErrorCode};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Warning Codes
// ============================================================================

/// A documentation link names something the analyzer knows but that
/// produced no reflection (excluded or not exported).
pub const LINK_EXCLUDED: &str = "LINK_EXCLUDED";

/// A documentation link names nothing known.
pub const LINK_NOT_FOUND: &str = "LINK_NOT_FOUND";

// ============================================================================
// Warning
// ============================================================================

/// Non-fatal diagnostic produced during conversion.
///
/// - `code`: Stable warning code (required)
/// - `message`: Human-readable message (required)
/// - `reflection`: Full name of the reflection the warning is about (optional)
/// - `text`: Literal source text that triggered it (optional)
/// - `suggestion`: Suggested action (optional)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Stable warning code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Owning reflection's full name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    /// Literal text that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Suggested action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Warning {
    /// Create a simple warning.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            code: code.into(),
            message: message.into(),
            reflection: None,
            text: None,
            suggestion: None,
        }
    }

    pub fn with_reflection(mut self, name: impl Into<String>) -> Self {
        self.reflection = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from a DocgraphError.
    pub fn from_error(err: &DocgraphError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let details = match err {
            DocgraphError::Output {
                path: Some(path), ..
            } => Some(serde_json::json!({ "path": path })),
            _ => None,
        };
        ErrorInfo {
            code,
            message: err.to_string(),
            details,
        }
    }
}

/// Response for a failed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn new(error: ErrorInfo) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error,
        }
    }

    pub fn from_error(err: &DocgraphError) -> Self {
        Self::new(ErrorInfo::from_error(err))
    }
}

// ============================================================================
// Response Structs
// ============================================================================

/// Response for the convert command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Project name.
    pub project: String,
    /// Number of live reflections, project root included.
    pub reflection_count: usize,
    /// Number of routed pages.
    pub page_count: usize,
    /// Files written, in write order.
    pub outputs: Vec<String>,
    /// Conversion warnings.
    #[serde(serialize_with = "serialize_sorted_warnings")]
    pub warnings: Vec<Warning>,
}

impl ConvertResponse {
    pub fn new(
        project: impl Into<String>,
        reflection_count: usize,
        page_count: usize,
        outputs: Vec<String>,
        warnings: Vec<Warning>,
    ) -> Self {
        ConvertResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            project: project.into(),
            reflection_count,
            page_count,
            outputs,
            warnings,
        }
    }
}

// ============================================================================
// Serialization Helpers
// ============================================================================

/// Serialize warnings sorted by (reflection, code, text).
fn serialize_sorted_warnings<S>(warnings: &[Warning], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted: Vec<_> = warnings.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.reflection, &a.code, &a.text).cmp(&(&b.reflection, &b.code, &b.text))
    });
    sorted.serialize(serializer)
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Emit a response as compact JSON (single line) to a writer.
pub fn emit_response_compact<T: Serialize>(
    response: &T,
    writer: &mut impl Write,
) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod warning_tests {
        use super::*;

        #[test]
        fn optional_fields_are_omitted() {
            let w = Warning::new(LINK_NOT_FOUND, "no such thing");
            let json = serde_json::to_string(&w).unwrap();
            assert!(!json.contains("reflection"));
            assert!(!json.contains("suggestion"));
        }

        #[test]
        fn warnings_are_sorted_in_response() {
            let response = ConvertResponse::new(
                "demo",
                3,
                1,
                vec![],
                vec![
                    Warning::new(LINK_NOT_FOUND, "b").with_reflection("Z"),
                    Warning::new(LINK_EXCLUDED, "a").with_reflection("A"),
                ],
            );
            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value["warnings"][0]["reflection"], "A");
            assert_eq!(value["warnings"][1]["reflection"], "Z");
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn error_response_carries_code_and_path() {
            let err = DocgraphError::output("disk full", "out/pages.json");
            let response = ErrorResponse::from_error(&err);
            assert_eq!(response.status, "error");
            assert_eq!(response.error.code, 5);
            assert_eq!(response.error.details.unwrap()["path"], "out/pages.json");
        }

        #[test]
        fn emit_response_produces_valid_json() {
            let response = ConvertResponse::new("demo", 1, 1, vec!["index".into()], vec![]);
            let mut output = Vec::new();
            emit_response(&response, &mut output).unwrap();
            let parsed: serde_json::Value =
                serde_json::from_slice(&output).unwrap();
            assert_eq!(parsed["status"], "ok");

            let mut compact = Vec::new();
            emit_response_compact(&response, &mut compact).unwrap();
            assert_eq!(String::from_utf8(compact).unwrap().lines().count(), 1);
        }
    }
}
