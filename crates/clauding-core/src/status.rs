//! Agent session status records.
//!
//! One JSON document per session at `.agent-status-{sessionId}`. Two
//! independent writers touch the same file: the execution state machine and
//! the agent tool's hook script. Last write wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::ExecutionPhase;
use crate::types::SessionId;

pub const STATUS_FILE_PREFIX: &str = ".agent-status-";

/// Lifecycle event names shared with the agent tool's hook protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusEventType {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    ToolExecution,
    Stop,
    Notification,
    SessionEnd,
    SubagentStop,
    SessionError,
}

impl StatusEventType {
    pub const ALL: [StatusEventType; 10] = [
        StatusEventType::SessionStart,
        StatusEventType::UserPromptSubmit,
        StatusEventType::PreToolUse,
        StatusEventType::PostToolUse,
        StatusEventType::ToolExecution,
        StatusEventType::Stop,
        StatusEventType::Notification,
        StatusEventType::SessionEnd,
        StatusEventType::SubagentStop,
        StatusEventType::SessionError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusEventType::SessionStart => "SessionStart",
            StatusEventType::UserPromptSubmit => "UserPromptSubmit",
            StatusEventType::PreToolUse => "PreToolUse",
            StatusEventType::PostToolUse => "PostToolUse",
            StatusEventType::ToolExecution => "ToolExecution",
            StatusEventType::Stop => "Stop",
            StatusEventType::Notification => "Notification",
            StatusEventType::SessionEnd => "SessionEnd",
            StatusEventType::SubagentStop => "SubagentStop",
            StatusEventType::SessionError => "SessionError",
        }
    }

    /// Event type the state machine reports when entering `phase`.
    pub fn for_phase(phase: ExecutionPhase) -> Self {
        match phase {
            ExecutionPhase::Starting | ExecutionPhase::Running => StatusEventType::SessionStart,
            ExecutionPhase::Completing => StatusEventType::Stop,
            ExecutionPhase::Idle => StatusEventType::SessionEnd,
            ExecutionPhase::Error => StatusEventType::SessionError,
        }
    }
}

impl std::fmt::Display for StatusEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatusEventType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        StatusEventType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown status event type '{trimmed}'"))
    }
}

/// On-disk status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusRecord {
    pub event_type: StatusEventType,
    pub feature_name: String,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "processId")]
    pub pid: u32,
    /// Written by the state machine only; hook writes leave it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ExecutionPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentStatusRecord {
    pub fn new(
        event_type: StatusEventType,
        feature_name: impl Into<String>,
        session_id: SessionId,
        pid: u32,
    ) -> Self {
        Self {
            event_type,
            feature_name: feature_name.into(),
            session_id,
            timestamp: Utc::now(),
            pid,
            state: None,
            current_tool: None,
            error: None,
        }
    }

    pub fn with_state(mut self, state: ExecutionPhase) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_current_tool(mut self, tool: impl Into<String>) -> Self {
        self.current_tool = Some(tool.into());
        self
    }

    /// Attach an error. Only `SessionError` records carry one.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.event_type = StatusEventType::SessionError;
        self.error = Some(error.into());
        self
    }
}

/// File name of the status record for `session_id`.
pub fn status_file_name(session_id: &SessionId) -> String {
    format!("{STATUS_FILE_PREFIX}{}", session_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_record() -> AgentStatusRecord {
        AgentStatusRecord::new(
            StatusEventType::SessionStart,
            "demo",
            SessionId::new("demo-1700000000000-ab12cd"),
            4242,
        )
    }

    #[test]
    fn record_serializes_with_camel_case_wire_keys() {
        let record = mk_record().with_state(ExecutionPhase::Running);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["eventType"], "SessionStart");
        assert_eq!(value["featureName"], "demo");
        assert_eq!(value["sessionId"], "demo-1700000000000-ab12cd");
        assert_eq!(value["pid"], 4242);
        assert_eq!(value["state"], "running");
        assert!(value.get("error").is_none());
        assert!(value.get("currentTool").is_none());
    }

    #[test]
    fn hook_written_record_without_state_deserializes() {
        let raw = r#"{
            "eventType": "PreToolUse",
            "featureName": "demo",
            "sessionId": "demo-1-x",
            "timestamp": "2026-01-02T03:04:05Z",
            "processId": 17,
            "currentTool": "Bash"
        }"#;
        let record: AgentStatusRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.event_type, StatusEventType::PreToolUse);
        assert_eq!(record.pid, 17);
        assert_eq!(record.state, None);
        assert_eq!(record.current_tool.as_deref(), Some("Bash"));
    }

    #[test]
    fn with_error_turns_record_into_session_error() {
        let record = mk_record().with_error("pty closed unexpectedly");
        assert_eq!(record.event_type, StatusEventType::SessionError);
        assert_eq!(record.error.as_deref(), Some("pty closed unexpectedly"));
    }

    #[test]
    fn phase_mapping_covers_every_phase() {
        assert_eq!(
            StatusEventType::for_phase(ExecutionPhase::Starting),
            StatusEventType::SessionStart
        );
        assert_eq!(
            StatusEventType::for_phase(ExecutionPhase::Completing),
            StatusEventType::Stop
        );
        assert_eq!(
            StatusEventType::for_phase(ExecutionPhase::Idle),
            StatusEventType::SessionEnd
        );
        assert_eq!(
            StatusEventType::for_phase(ExecutionPhase::Error),
            StatusEventType::SessionError
        );
    }

    #[test]
    fn event_type_parses_case_insensitively() {
        assert_eq!(
            "sessionend".parse::<StatusEventType>().unwrap(),
            StatusEventType::SessionEnd
        );
        assert!("Bogus".parse::<StatusEventType>().is_err());
    }

    #[test]
    fn status_file_name_embeds_session_id() {
        assert_eq!(
            status_file_name(&SessionId::new("f-1-a")),
            ".agent-status-f-1-a"
        );
    }
}
