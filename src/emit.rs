//! Queued output writing.
//!
//! Outputs are declared in order and drained one after another on the tokio
//! runtime. A failing output is logged and recorded; the remaining outputs
//! are still written.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error};

/// Failure writing one output.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EmitError {
    /// Path of the output that failed.
    pub fn path(&self) -> &Path {
        match self {
            EmitError::CreateDir { path, .. } | EmitError::Write { path, .. } => path,
        }
    }
}

/// One pending output.
#[derive(Debug, Clone)]
struct PendingOutput {
    path: PathBuf,
    contents: String,
}

/// Result of draining a queue.
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Outputs written, in queue order.
    pub written: Vec<PathBuf>,
    /// Outputs that failed, in queue order.
    pub failed: Vec<EmitError>,
}

impl EmitReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered queue of files to write.
#[derive(Debug, Default)]
pub struct OutputQueue {
    pending: Vec<PendingOutput>,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an output. Parent directories are created when drained.
    pub fn push(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.pending.push(PendingOutput {
            path: path.into(),
            contents: contents.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Write every output in declaration order.
    pub async fn drain(self) -> EmitReport {
        let mut report = EmitReport::default();
        for output in self.pending {
            match write_output(&output).await {
                Ok(()) => {
                    debug!(path = %output.path.display(), bytes = output.contents.len(), "output written");
                    report.written.push(output.path);
                }
                Err(err) => {
                    error!(path = %err.path().display(), "{}", err);
                    report.failed.push(err);
                }
            }
        }
        report
    }
}

async fn write_output(output: &PendingOutput) -> Result<(), EmitError> {
    if let Some(parent) = output.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| EmitError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(&output.path, output.contents.as_bytes())
        .await
        .map_err(|source| EmitError::Write {
            path: output.path.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_in_order_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = OutputQueue::new();
        queue.push(dir.path().join("a.json"), "{}");
        queue.push(dir.path().join("nested/deep/b.json"), "[]");
        assert_eq!(queue.len(), 2);

        let report = queue.drain().await;
        assert!(report.is_success());
        assert_eq!(
            report.written,
            vec![dir.path().join("a.json"), dir.path().join("nested/deep/b.json")]
        );
        let b = std::fs::read_to_string(dir.path().join("nested/deep/b.json")).unwrap();
        assert_eq!(b, "[]");
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_outputs() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where a directory is expected
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let mut queue = OutputQueue::new();
        queue.push(blocker.join("inner.json"), "{}");
        queue.push(dir.path().join("after.json"), "{}");
        let report = queue.drain().await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.written, vec![dir.path().join("after.json")]);
        assert!(dir.path().join("after.json").exists());
    }
}
