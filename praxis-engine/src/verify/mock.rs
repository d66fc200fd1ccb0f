//! Mock verifier for testing.
//!
//! Queue results with `queue_output()` / `queue_timeout()` /
//! `queue_unavailable()` before driving the engine; each
//! `execute_command()` consumes one queued result. File operations run
//! against an in-memory map.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use praxis_core::CommandOutput;

use super::traits::{FileInfo, Verifier, VerifyError};

enum Scripted {
    Output(CommandOutput),
    Timeout,
    Unavailable(String),
}

#[derive(Default)]
struct State {
    scripted: VecDeque<Scripted>,
    files: HashMap<PathBuf, String>,
    executed: Vec<String>,
}

/// Scriptable in-memory implementation of `Verifier`.
#[derive(Default)]
pub struct MockVerifier {
    state: Mutex<State>,
}

impl MockVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful command result.
    pub fn queue_output(&self, stdout: &str, exit_code: i32) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .scripted
            .push_back(Scripted::Output(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(exit_code),
            }));
    }

    /// Queue a timeout for the next command.
    pub fn queue_timeout(&self) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .scripted
            .push_back(Scripted::Timeout);
    }

    /// Queue an unavailable error for the next command.
    pub fn queue_unavailable(&self, reason: &str) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .scripted
            .push_back(Scripted::Unavailable(reason.to_string()));
    }

    /// Seed an in-memory file.
    pub fn seed_file(&self, path: impl Into<PathBuf>, content: &str) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .files
            .insert(path.into(), content.to_string());
    }

    /// Commands executed so far, in order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .executed
            .clone()
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn execute_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, VerifyError> {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.executed.push(command.to_string());
        match state.scripted.pop_front() {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Timeout) => Err(VerifyError::Timeout(timeout)),
            Some(Scripted::Unavailable(reason)) => Err(VerifyError::Unavailable(reason)),
            // Unscripted commands succeed with empty output.
            None => Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            }),
        }
    }

    async fn read_file(&self, path: &Path) -> Result<String, VerifyError> {
        let state = self.state.lock().expect("mock state poisoned");
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| VerifyError::PathNotAllowed(path.to_path_buf()))
    }

    async fn read_files(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, VerifyError> {
        let mut contents = Vec::with_capacity(paths.len());
        for path in paths {
            contents.push((path.clone(), self.read_file(path).await?));
        }
        Ok(contents)
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<(), VerifyError> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .files
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, VerifyError> {
        let state = self.state.lock().expect("mock state poisoned");
        let mut names: Vec<String> = state
            .files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn move_file(&self, from: &Path, to: &Path) -> Result<(), VerifyError> {
        let mut state = self.state.lock().expect("mock state poisoned");
        let content = state
            .files
            .remove(from)
            .ok_or_else(|| VerifyError::PathNotAllowed(from.to_path_buf()))?;
        state.files.insert(to.to_path_buf(), content);
        Ok(())
    }

    async fn search_files(&self, pattern: &str) -> Result<Vec<PathBuf>, VerifyError> {
        let state = self.state.lock().expect("mock state poisoned");
        let mut hits: Vec<PathBuf> = state
            .files
            .keys()
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().contains(pattern))
            })
            .cloned()
            .collect();
        hits.sort();
        Ok(hits)
    }

    async fn get_file_info(&self, path: &Path) -> Result<FileInfo, VerifyError> {
        let state = self.state.lock().expect("mock state poisoned");
        let content = state
            .files
            .get(path)
            .ok_or_else(|| VerifyError::PathNotAllowed(path.to_path_buf()))?;
        Ok(FileInfo {
            path: path.to_path_buf(),
            size: content.len() as u64,
            modified: Some(chrono::Utc::now()),
            is_dir: false,
        })
    }
}
