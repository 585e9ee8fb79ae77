//! Error bridge implementations for root-crate errors.
//!
//! These live here rather than in `docgraph-core` because the output queue
//! belongs to the root crate.

use docgraph_core::error::DocgraphError;

use crate::emit::EmitError;

// ============================================================================
// Bridge: EmitError -> DocgraphError
// ============================================================================

impl From<EmitError> for DocgraphError {
    fn from(err: EmitError) -> Self {
        let path = err.path().display().to_string();
        DocgraphError::Output {
            message: err.to_string(),
            path: Some(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_core::error::OutputErrorCode;
    use std::path::PathBuf;

    #[test]
    fn emit_error_maps_to_output_code_with_path() {
        let err = EmitError::Write {
            path: PathBuf::from("out/project.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let bridged = DocgraphError::from(err);
        assert_eq!(OutputErrorCode::from(&bridged), OutputErrorCode::OutputError);
        match bridged {
            DocgraphError::Output { path, message } => {
                assert_eq!(path.as_deref(), Some("out/project.json"));
                assert!(message.contains("denied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
