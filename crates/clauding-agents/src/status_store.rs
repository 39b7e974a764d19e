//! Read/write access to `.agent-status-*` records in an outputs directory.
//!
//! No locking: the hook script writes the same files and the consumers only
//! need eventual freshness.

use std::fs;
use std::path::{Path, PathBuf};

use clauding_core::status::{status_file_name, AgentStatusRecord, STATUS_FILE_PREFIX};
use clauding_core::types::SessionId;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("failed to create status directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write status file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read status file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode status record: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed status file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusStore {
    pub dir: PathBuf,
}

impl StatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.dir.join(status_file_name(session_id))
    }

    /// Replace the record for `record.session_id`.
    ///
    /// Written to a sibling temp file and renamed so a polling reader never
    /// sees a half-written document.
    pub fn write(&self, record: &AgentStatusRecord) -> Result<PathBuf, StatusError> {
        fs::create_dir_all(&self.dir).map_err(|source| StatusError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(&record.session_id);
        let body =
            serde_json::to_vec_pretty(record).map_err(|source| StatusError::Encode { source })?;
        let staging = self.dir.join(format!(
            "{}.tmp-{}",
            status_file_name(&record.session_id),
            std::process::id()
        ));
        fs::write(&staging, body).map_err(|source| StatusError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StatusError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Best-effort variant of [`StatusStore::write`]: failures are logged.
    pub fn write_logged(&self, record: &AgentStatusRecord) {
        if let Err(err) = self.write(record) {
            warn!(
                session = %record.session_id,
                event = %record.event_type,
                "status write failed: {err}"
            );
        }
    }

    pub fn read(&self, session_id: &SessionId) -> Result<Option<AgentStatusRecord>, StatusError> {
        read_record(&self.path_for(session_id))
    }

    /// All parseable records, newest first. Malformed files are skipped.
    pub fn list(&self) -> Result<Vec<AgentStatusRecord>, StatusError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StatusError::Read {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(STATUS_FILE_PREFIX) || name.contains(".tmp-") {
                continue;
            }
            match read_record(&entry.path()) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => warn!("skipping status file: {err}"),
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}

fn read_record(path: &Path) -> Result<Option<AgentStatusRecord>, StatusError> {
    let body = match fs::read_to_string(path) {
        Ok(body) => body,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StatusError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&body)
        .map(Some)
        .map_err(|source| StatusError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use clauding_core::state::ExecutionPhase;
    use clauding_core::status::StatusEventType;

    fn record(session: &str, event: StatusEventType) -> AgentStatusRecord {
        AgentStatusRecord::new(event, "demo", SessionId::new(session), 99)
    }

    #[test]
    fn write_then_read_returns_latest_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StatusStore::new(dir.path().join("outputs"));
        let session = SessionId::new("demo-1-a");

        store
            .write(&record("demo-1-a", StatusEventType::SessionStart))
            .expect("first write");
        let path = store
            .write(
                &record("demo-1-a", StatusEventType::SessionEnd).with_state(ExecutionPhase::Idle),
            )
            .expect("second write");

        assert!(path.ends_with(".agent-status-demo-1-a"));
        let loaded = store.read(&session).expect("read").expect("record");
        assert_eq!(loaded.event_type, StatusEventType::SessionEnd);
        assert_eq!(loaded.state, Some(ExecutionPhase::Idle));
    }

    #[test]
    fn read_missing_record_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StatusStore::new(dir.path());
        assert!(store.read(&SessionId::new("nope")).unwrap().is_none());
    }

    #[test]
    fn read_malformed_record_is_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StatusStore::new(dir.path());
        fs::write(dir.path().join(".agent-status-bad"), "{not json").unwrap();

        let err = store.read(&SessionId::new("bad")).expect_err("decode error");
        assert!(matches!(err, StatusError::Decode { .. }));
    }

    #[test]
    fn list_orders_newest_first_and_skips_noise() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StatusStore::new(dir.path());

        let mut older = record("a-1-x", StatusEventType::SessionEnd);
        older.timestamp = Utc::now() - Duration::seconds(60);
        store.write(&older).unwrap();
        store
            .write(&record("b-2-y", StatusEventType::PreToolUse))
            .unwrap();
        fs::write(dir.path().join(".agent-status-broken"), "oops").unwrap();
        fs::write(dir.path().join("transcript.txt"), "raw").unwrap();

        let sessions: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|record| record.session_id.0)
            .collect();
        assert_eq!(sessions, vec!["b-2-y".to_string(), "a-1-x".to_string()]);
    }

    #[test]
    fn list_of_missing_directory_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StatusStore::new(dir.path().join("missing"));
        assert!(store.list().unwrap().is_empty());
    }
}
