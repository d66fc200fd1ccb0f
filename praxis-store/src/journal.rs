//! Append-only JSONL observation journal.
//!
//! One observation per line. The journal is a durable mirror of the
//! observation log, queryable with the same filters the engine uses
//! against the graph store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use praxis_core::{ActivityId, Observation, ObservationKind, SessionId};

use crate::error::{Result, StoreError};

/// Upper bound on a single query, mirroring the log reader's cap.
const MAX_QUERY_LIMIT: usize = 2000;

/// Filter for journal queries. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ObservationFilter {
    pub session: Option<SessionId>,
    pub activity: Option<ActivityId>,
    pub kinds: Vec<ObservationKind>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ObservationFilter {
    /// Filter to one session.
    #[must_use]
    pub fn for_session(session: SessionId) -> Self {
        Self {
            session: Some(session),
            ..Self::default()
        }
    }

    fn matches(&self, obs: &Observation) -> bool {
        if self.session.as_ref().is_some_and(|s| &obs.session != s) {
            return false;
        }
        if self.activity.is_some_and(|a| obs.activity != Some(a)) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&obs.kind) {
            return false;
        }
        if self.since.is_some_and(|since| obs.ts < since) {
            return false;
        }
        if self.until.is_some_and(|until| obs.ts > until) {
            return false;
        }
        true
    }

    fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(MAX_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT)
    }
}

/// JSONL file-based observation journal.
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a journal at the given path. The file is created lazily on
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Journal(format!("failed to create journal dir: {e}")))?;
        }
        Ok(())
    }

    /// Append one observation as a single line.
    pub async fn append(&self, observation: &Observation) -> Result<()> {
        self.ensure_parent_dir().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::Journal(format!("failed to open journal: {e}")))?;

        let json = serde_json::to_string(observation)?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| StoreError::Journal(format!("failed to write entry: {e}")))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| StoreError::Journal(format!("failed to write newline: {e}")))?;
        file.flush()
            .await
            .map_err(|e| StoreError::Journal(format!("failed to flush: {e}")))?;

        Ok(())
    }

    /// Append a batch of observations in order.
    pub async fn append_all(&self, observations: &[Observation]) -> Result<()> {
        for observation in observations {
            self.append(observation).await?;
        }
        Ok(())
    }

    /// Read observations matching the filter, in file order, up to the
    /// filter's limit (clamped to 1..=2000).
    pub async fn query(&self, filter: &ObservationFilter) -> Result<Vec<Observation>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .map_err(|e| StoreError::Journal(format!("failed to open journal: {e}")))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut results = Vec::new();
        let limit = filter.effective_limit();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| StoreError::Journal(format!("failed to read journal: {e}")))?
        {
            if line.trim().is_empty() {
                continue;
            }
            // Tolerate unreadable lines rather than failing the whole query.
            let Ok(observation) = serde_json::from_str::<Observation>(&line) else {
                continue;
            };
            if filter.matches(&observation) {
                results.push(observation);
                if results.len() >= limit {
                    break;
                }
            }
        }

        Ok(results)
    }
}
