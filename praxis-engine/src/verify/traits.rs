//! Verifier trait and error types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use praxis_core::CommandOutput;

/// Errors from the verification adapter.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Path resolves outside the caller-declared allowed root. The scope
    /// is never silently widened; this fails closed.
    #[error("path not allowed: {0}")]
    PathNotAllowed(PathBuf),

    /// Command is not on the caller-declared allowlist.
    #[error("command not allowed: {0}")]
    CommandNotAllowed(String),

    /// The bounded timeout elapsed before the command finished.
    #[error("verification timed out after {0:?}")]
    Timeout(Duration),

    /// The adapter backend is unreachable; retried once with backoff.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata for one file inside the allowed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

/// External command-execution and file-inspection capabilities, scoped to
/// a caller-declared allowed root.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Run a command with a bounded timeout and capture its output.
    async fn execute_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, VerifyError>;

    /// Read one file as UTF-8 text.
    async fn read_file(&self, path: &Path) -> Result<String, VerifyError>;

    /// Read several files; fails on the first unreadable one.
    async fn read_files(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, VerifyError>;

    /// Write a fixture file, creating parent directories inside the root.
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), VerifyError>;

    /// Names of entries directly under a directory.
    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, VerifyError>;

    /// Rename/move a file within the root.
    async fn move_file(&self, from: &Path, to: &Path) -> Result<(), VerifyError>;

    /// Files under the root whose name contains the pattern.
    async fn search_files(&self, pattern: &str) -> Result<Vec<PathBuf>, VerifyError>;

    /// Size and modification metadata for one path.
    async fn get_file_info(&self, path: &Path) -> Result<FileInfo, VerifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait is object-safe
    #[test]
    fn verifier_is_object_safe() {
        fn _takes_boxed(_: Box<dyn Verifier>) {}
    }

    #[test]
    fn errors_display_their_context() {
        let err = VerifyError::PathNotAllowed(PathBuf::from("/etc/passwd"));
        assert!(err.to_string().contains("/etc/passwd"));

        let err = VerifyError::CommandNotAllowed("rm -rf /".into());
        assert!(err.to_string().contains("rm -rf /"));
    }
}
