//! Environment handed to the agent process.
//!
//! These variables are the only way a hook script launched by the agent can
//! tell which feature and session it is reporting for.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::PathBuf;

use clauding_core::types::SessionId;

pub const ENV_FEATURE_NAME: &str = "CLAUDING_FEATURE_NAME";
pub const ENV_WORKTREE_PATH: &str = "CLAUDING_WORKTREE_PATH";
pub const ENV_SESSION_ID: &str = "CLAUDING_SESSION_ID";
pub const ENV_COMMAND: &str = "CLAUDING_COMMAND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnv {
    pub feature_name: String,
    pub worktree: PathBuf,
    pub session_id: SessionId,
    pub command: String,
}

impl SessionEnv {
    /// Sorted by key.
    pub fn to_env_vec(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            (ENV_FEATURE_NAME.to_string(), self.feature_name.clone()),
            (
                ENV_WORKTREE_PATH.to_string(),
                self.worktree.display().to_string(),
            ),
            (ENV_SESSION_ID.to_string(), self.session_id.0.clone()),
            (ENV_COMMAND.to_string(), self.command.clone()),
        ];
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    /// Rebuild from variables set by [`SessionEnv::to_env_vec`]. Feature
    /// name and session id are required; the rest default to empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Some(Self {
            feature_name: non_empty(ENV_FEATURE_NAME)?,
            session_id: SessionId::new(non_empty(ENV_SESSION_ID)?),
            worktree: PathBuf::from(lookup(ENV_WORKTREE_PATH).unwrap_or_default()),
            command: lookup(ENV_COMMAND).unwrap_or_default(),
        })
    }

    pub fn from_process_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// `{feature}-{epochMillis}-{random}`.
pub fn generate_session_id(feature_name: &str) -> SessionId {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    SessionId(format!(
        "{feature_name}-{}-{suffix}",
        Utc::now().timestamp_millis()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample() -> SessionEnv {
        SessionEnv {
            feature_name: "demo".to_string(),
            worktree: PathBuf::from("/work/demo"),
            session_id: SessionId::new("demo-1-abc"),
            command: "implement-plan".to_string(),
        }
    }

    #[test]
    fn env_vec_is_sorted_and_complete() {
        let vars = sample().to_env_vec();
        let keys: Vec<&str> = vars.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "CLAUDING_COMMAND",
                "CLAUDING_FEATURE_NAME",
                "CLAUDING_SESSION_ID",
                "CLAUDING_WORKTREE_PATH"
            ]
        );
        assert!(vars.contains(&(ENV_WORKTREE_PATH.to_string(), "/work/demo".to_string())));
    }

    #[test]
    fn lookup_round_trips_through_env_vec() {
        let vars: HashMap<String, String> = sample().to_env_vec().into_iter().collect();
        let rebuilt = SessionEnv::from_lookup(|key| vars.get(key).cloned()).expect("complete");
        assert_eq!(rebuilt, sample());
    }

    #[test]
    fn lookup_requires_feature_and_session() {
        let only_feature = |key: &str| (key == ENV_FEATURE_NAME).then(|| "demo".to_string());
        assert!(SessionEnv::from_lookup(only_feature).is_none());

        let blank_session = |key: &str| match key {
            ENV_FEATURE_NAME => Some("demo".to_string()),
            ENV_SESSION_ID => Some("  ".to_string()),
            _ => None,
        };
        assert!(SessionEnv::from_lookup(blank_session).is_none());
    }

    #[test]
    fn session_ids_embed_feature_and_differ() {
        let first = generate_session_id("demo");
        let second = generate_session_id("demo");
        assert_ne!(first, second);

        let parts: Vec<&str> = first.0.rsplitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], "demo");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[0].len(), 6);
    }
}
