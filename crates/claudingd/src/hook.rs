//! Status writes from the agent's own lifecycle hooks.
//!
//! The agent tool runs `clauding hook <Event>` with a JSON payload on stdin.
//! The session it belongs to comes from the `CLAUDING_*` environment the
//! orchestrator injected, so the hook and the state machine update the same
//! status file independently.

use serde_json::Value;
use std::path::PathBuf;

use clauding_agents::status_store::{StatusError, StatusStore};
use clauding_core::status::{AgentStatusRecord, StatusEventType};
use clauding_core::types::FeatureLayout;
use tracing::debug;

use crate::env_inject::SessionEnv;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("hook payload is not valid JSON: {source}")]
    Payload {
        #[source]
        source: serde_json::Error,
    },
    #[error("no event type given and none in the hook payload")]
    MissingEvent,
    #[error("{message}")]
    UnknownEvent { message: String },
    #[error("CLAUDING_FEATURE_NAME and CLAUDING_SESSION_ID must be set")]
    MissingSessionEnv,
    #[error(transparent)]
    Status(#[from] StatusError),
}

/// Field by snake_case key, falling back to camelCase.
fn get_str<'a>(payload: &'a Value, snake_key: &str) -> Option<&'a str> {
    payload
        .get(snake_key)
        .or_else(|| payload.get(snake_to_camel(snake_key)))
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn parse_payload(stdin: &str) -> Result<Value, HookError> {
    if stdin.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(stdin).map_err(|source| HookError::Payload { source })
}

/// Build the record for one hook invocation. `event` wins over the
/// payload's `hook_event_name`.
pub fn record_from_hook(
    event: Option<StatusEventType>,
    payload: &Value,
    env: &SessionEnv,
    pid: u32,
) -> Result<AgentStatusRecord, HookError> {
    let event = match event {
        Some(event) => event,
        None => get_str(payload, "hook_event_name")
            .ok_or(HookError::MissingEvent)?
            .parse::<StatusEventType>()
            .map_err(|message| HookError::UnknownEvent { message })?,
    };

    let mut record =
        AgentStatusRecord::new(event, env.feature_name.clone(), env.session_id.clone(), pid);
    if matches!(
        event,
        StatusEventType::PreToolUse | StatusEventType::PostToolUse | StatusEventType::ToolExecution
    ) {
        if let Some(tool) = get_str(payload, "tool_name") {
            record = record.with_current_tool(tool);
        }
    }

    let error = get_str(payload, "error");
    if let Some(error) = error {
        record = record.with_error(error);
    } else if event == StatusEventType::SessionError {
        let message = get_str(payload, "message").unwrap_or("agent reported an error");
        record = record.with_error(message);
    }
    Ok(record)
}

/// Write the hook's record into the feature's outputs directory.
pub fn handle_hook(
    event: Option<StatusEventType>,
    stdin: &str,
    env: Option<SessionEnv>,
    pid: u32,
) -> Result<PathBuf, HookError> {
    let env = env.ok_or(HookError::MissingSessionEnv)?;
    let payload = parse_payload(stdin)?;
    let record = record_from_hook(event, &payload, &env, pid)?;

    let store = StatusStore::new(FeatureLayout::for_worktree(&env.worktree).outputs_dir);
    let path = store.write(&record)?;
    debug!(
        session = %record.session_id,
        event = %record.event_type,
        "hook status written"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauding_core::types::SessionId;

    fn env(worktree: &std::path::Path) -> SessionEnv {
        SessionEnv {
            feature_name: "demo".to_string(),
            worktree: worktree.to_path_buf(),
            session_id: SessionId::new("demo-1700000000000-abc123"),
            command: "Implement Plan".to_string(),
        }
    }

    #[test]
    fn tool_events_carry_the_tool_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let payload = parse_payload(r#"{"hook_event_name":"PreToolUse","tool_name":"Edit"}"#)
            .unwrap();
        let record = record_from_hook(None, &payload, &env(dir.path()), 10).unwrap();
        assert_eq!(record.event_type, StatusEventType::PreToolUse);
        assert_eq!(record.current_tool.as_deref(), Some("Edit"));
        assert_eq!(record.state, None);
        assert_eq!(record.error, None);
    }

    #[test]
    fn explicit_event_overrides_payload_and_camel_case_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let payload = parse_payload(r#"{"hookEventName":"Stop","toolName":"Bash"}"#).unwrap();
        let record = record_from_hook(
            Some(StatusEventType::PostToolUse),
            &payload,
            &env(dir.path()),
            10,
        )
        .unwrap();
        assert_eq!(record.event_type, StatusEventType::PostToolUse);
        assert_eq!(record.current_tool.as_deref(), Some("Bash"));
    }

    #[test]
    fn error_field_turns_record_into_session_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let payload = parse_payload(r#"{"hook_event_name":"Stop","error":"rate limited"}"#).unwrap();
        let record = record_from_hook(None, &payload, &env(dir.path()), 10).unwrap();
        assert_eq!(record.event_type, StatusEventType::SessionError);
        assert_eq!(record.error.as_deref(), Some("rate limited"));

        let bare = record_from_hook(
            Some(StatusEventType::SessionError),
            &Value::Null,
            &env(dir.path()),
            10,
        )
        .unwrap();
        assert_eq!(bare.error.as_deref(), Some("agent reported an error"));
    }

    #[test]
    fn missing_or_unknown_event_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            record_from_hook(None, &Value::Null, &env(dir.path()), 1),
            Err(HookError::MissingEvent)
        ));
        let payload = parse_payload(r#"{"hook_event_name":"PreCompact"}"#).unwrap();
        assert!(matches!(
            record_from_hook(None, &payload, &env(dir.path()), 1),
            Err(HookError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn handle_hook_writes_into_feature_outputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = env(dir.path());
        let path = handle_hook(
            Some(StatusEventType::UserPromptSubmit),
            "",
            Some(session.clone()),
            77,
        )
        .unwrap();

        assert_eq!(
            path,
            dir.path()
                .join(".clauding/outputs/.agent-status-demo-1700000000000-abc123")
        );
        let stored = StatusStore::new(dir.path().join(".clauding/outputs"))
            .read(&session.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.event_type, StatusEventType::UserPromptSubmit);
        assert_eq!(stored.pid, 77);
        assert_eq!(stored.feature_name, "demo");
    }

    #[test]
    fn handle_hook_without_session_env_fails() {
        assert!(matches!(
            handle_hook(Some(StatusEventType::Stop), "", None, 1),
            Err(HookError::MissingSessionEnv)
        ));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(matches!(
            parse_payload("{oops"),
            Err(HookError::Payload { .. })
        ));
    }
}
