//! Core types shared by every clauding crate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory (relative to a worktree) holding per-feature metadata.
pub const METADATA_DIR_NAME: &str = ".clauding";
/// Directory (relative to the metadata dir) holding transcripts and status files.
pub const OUTPUTS_DIR_NAME: &str = "outputs";
/// Marker written after an implement-class command finishes.
pub const WRAP_UP_MARKER_NAME: &str = ".wrap-up-pending";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of a parsed transcript event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionEventKind {
    UserInput,
    AgentResponse,
    Status,
    Prompt,
}

impl SessionEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEventKind::UserInput => "user-input",
            SessionEventKind::AgentResponse => "agent-response",
            SessionEventKind::Status => "status",
            SessionEventKind::Prompt => "prompt",
        }
    }
}

impl std::fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of conversation recovered from a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub kind: SessionEventKind,
    pub content: String,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind, content: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            kind,
            content: content.into(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Well-known paths for one feature worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    pub worktree: PathBuf,
    pub metadata_dir: PathBuf,
    pub outputs_dir: PathBuf,
}

impl FeatureLayout {
    pub fn for_worktree(worktree: impl AsRef<Path>) -> Self {
        let worktree = worktree.as_ref().to_path_buf();
        let metadata_dir = worktree.join(METADATA_DIR_NAME);
        let outputs_dir = metadata_dir.join(OUTPUTS_DIR_NAME);
        Self {
            worktree,
            metadata_dir,
            outputs_dir,
        }
    }

    pub fn wrap_up_marker(&self) -> PathBuf {
        self.metadata_dir.join(WRAP_UP_MARKER_NAME)
    }

    /// Feature name implied by the worktree directory name.
    pub fn default_feature_name(&self) -> String {
        self.worktree
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "feature".to_string())
    }
}
