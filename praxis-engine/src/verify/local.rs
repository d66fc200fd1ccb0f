//! Local sandboxed verifier.
//!
//! Runs commands and touches files under one allowed root. Paths are
//! resolved lexically before any filesystem call; anything escaping the
//! root fails closed with `PathNotAllowed`. Commands must match a
//! caller-declared allowlist of program names.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use praxis_core::CommandOutput;

use super::traits::{FileInfo, Verifier, VerifyError};

/// Verifier backed by the local filesystem and process spawning.
pub struct LocalVerifier {
    root: PathBuf,
    allowed_programs: Vec<String>,
}

impl LocalVerifier {
    /// Create a verifier scoped to `root`. The allowlist starts empty, so
    /// every command is rejected until programs are declared.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allowed_programs: Vec::new(),
        }
    }

    /// Declare the programs `execute_command` may spawn.
    #[must_use]
    pub fn with_allowed_programs(mut self, programs: Vec<String>) -> Self {
        self.allowed_programs = programs;
        self
    }

    /// The declared allowed root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller path against the root, rejecting escapes.
    ///
    /// Resolution is lexical: `..` components may not pop past the root,
    /// and absolute paths must already sit under it.
    fn resolve(&self, path: &Path) -> Result<PathBuf, VerifyError> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| VerifyError::PathNotAllowed(path.to_path_buf()))?
        } else {
            path
        };

        let mut resolved = self.root.clone();
        let mut depth: usize = 0;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(VerifyError::PathNotAllowed(path.to_path_buf()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(VerifyError::PathNotAllowed(path.to_path_buf()));
                }
            }
        }
        Ok(resolved)
    }

    fn check_program(&self, command: &str) -> Result<(String, Vec<String>), VerifyError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| VerifyError::CommandNotAllowed(command.to_string()))?;
        if !self.allowed_programs.iter().any(|p| p == &program) {
            warn!(%program, "rejecting command outside allowlist");
            return Err(VerifyError::CommandNotAllowed(command.to_string()));
        }
        Ok((program, parts.collect()))
    }

    fn modified_time(meta: &std::fs::Metadata) -> Option<chrono::DateTime<chrono::Utc>> {
        meta.modified().ok().map(chrono::DateTime::from)
    }
}

#[async_trait]
impl Verifier for LocalVerifier {
    async fn execute_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, VerifyError> {
        let (program, args) = self.check_program(command)?;
        debug!(%program, ?timeout, "executing verification command");

        let run = tokio::process::Command::new(&program)
            .args(&args)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| VerifyError::Timeout(timeout))??;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<String, VerifyError> {
        let resolved = self.resolve(path)?;
        Ok(tokio::fs::read_to_string(resolved).await?)
    }

    async fn read_files(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, VerifyError> {
        let mut contents = Vec::with_capacity(paths.len());
        for path in paths {
            let text = self.read_file(path).await?;
            contents.push((path.clone(), text));
        }
        Ok(contents)
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<(), VerifyError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(resolved, content).await?;
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, VerifyError> {
        let resolved = self.resolve(path)?;
        let mut entries = tokio::fs::read_dir(resolved).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn move_file(&self, from: &Path, to: &Path) -> Result<(), VerifyError> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(from, to).await?;
        Ok(())
    }

    async fn search_files(&self, pattern: &str) -> Result<Vec<PathBuf>, VerifyError> {
        let mut pending = vec![self.root.clone()];
        let mut hits = Vec::new();
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().contains(pattern))
                {
                    hits.push(path);
                }
            }
        }
        hits.sort();
        Ok(hits)
    }

    async fn get_file_info(&self, path: &Path) -> Result<FileInfo, VerifyError> {
        let resolved = self.resolve(path)?;
        let meta = tokio::fs::metadata(&resolved).await?;
        Ok(FileInfo {
            path: resolved,
            size: meta.len(),
            modified: Self::modified_time(&meta),
            is_dir: meta.is_dir(),
        })
    }
}
