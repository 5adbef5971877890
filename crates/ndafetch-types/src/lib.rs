//! Shared types for ndafetch
//!
//! This crate contains the data structures passed between the core
//! orchestration library and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Prefix that marks a manifest field as a remote object reference
pub const REMOTE_SCHEME_PREFIX: &str = "s3://";

// ============================================================================
// Manifest Types
// ============================================================================

/// An opaque remote-storage locator taken from the manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectReference(String);

impl ObjectReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// File Types
// ============================================================================

/// Package-file identifier assigned by the API.
///
/// The API is free to use either numbers or strings; the original
/// representation is kept so it can be echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileId {
    Number(i64),
    Text(String),
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileId::Number(n) => write!(f, "{}", n),
            FileId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FileId {
    fn from(value: i64) -> Self {
        FileId::Number(value)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        FileId::Text(value.to_string())
    }
}

/// Status of a single file within one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Resolved,
    Downloaded,
    Failed,
}

/// A file the package resolved for the current iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub display_name: String,
    pub download_url: Option<String>,
    pub status: FileStatus,
}

impl FileRecord {
    pub fn new(id: FileId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            download_url: None,
            status: FileStatus::Pending,
        }
    }

    /// Attach a signed URL. Empty URLs are ignored.
    pub fn attach_url(&mut self, url: String) {
        if url.is_empty() {
            return;
        }
        self.download_url = Some(url);
        self.status = FileStatus::Resolved;
    }

    /// The signed URL, if one was issued and is non-empty
    pub fn url(&self) -> Option<&str> {
        self.download_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Mark the file as downloaded.
    ///
    /// Returns `false` and marks the file failed when there is no usable URL,
    /// since a transfer without a URL cannot have happened.
    pub fn mark_downloaded(&mut self) -> bool {
        if self.url().is_none() {
            self.status = FileStatus::Failed;
            return false;
        }
        self.status = FileStatus::Downloaded;
        true
    }

    pub fn mark_failed(&mut self) {
        self.status = FileStatus::Failed;
    }

    pub fn is_downloaded(&self) -> bool {
        self.status == FileStatus::Downloaded
    }
}

// ============================================================================
// Batch Types
// ============================================================================

/// All files handled within one retry iteration.
///
/// A batch is built fresh by every resolution pass and dropped when the
/// iteration ends; records never carry over between iterations.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    records: BTreeMap<FileId, FileRecord>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &FileId) -> Option<&FileRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &FileId) -> Option<&mut FileRecord> {
        self.records.get_mut(id)
    }

    pub fn ids(&self) -> Vec<FileId> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.records.values_mut()
    }

    /// True iff every record reached `Downloaded`. An empty batch qualifies.
    pub fn all_downloaded(&self) -> bool {
        self.records.values().all(FileRecord::is_downloaded)
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.records.values().filter(|r| r.status == status).count()
    }
}

// ============================================================================
// Orchestration Types
// ============================================================================

/// States of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorState {
    Authenticating,
    Resolving,
    Downloading,
    Waiting,
    Done,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Authenticating => "authenticating",
            OrchestratorState::Resolving => "resolving",
            OrchestratorState::Downloading => "downloading",
            OrchestratorState::Waiting => "waiting",
            OrchestratorState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of a completed orchestrator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of iterations started (one per authentication)
    pub iterations: u32,
    /// Number of cool-down waits taken
    pub waits: u32,
    /// Every state the orchestrator entered, in order
    pub transitions: Vec<OrchestratorState>,
    /// Files downloaded in the final iteration
    pub files: usize,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// How many times the orchestrator entered `state`
    pub fn entered(&self, state: OrchestratorState) -> usize {
        self.transitions.iter().filter(|s| **s == state).count()
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events emitted by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchEvent {
    IterationStarted {
        iteration: u32,
    },
    StateChanged {
        state: OrchestratorState,
    },
    BatchResolved {
        references: usize,
        files: usize,
    },
    FileDownloaded {
        id: FileId,
        name: String,
        speed: String,
    },
    FileFailed {
        id: FileId,
        name: String,
    },
    Waiting {
        #[serde(with = "duration_secs")]
        delay: Duration,
        failed: usize,
    },
    Finished {
        iterations: u32,
    },
}

/// Serialize durations as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
