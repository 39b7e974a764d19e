//! Execution phases for a single agent run.
//!
//! The phase is held in memory by the orchestrator; the on-disk status record
//! only mirrors it.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of an agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Nothing in flight; the only phase a new run may start from.
    #[default]
    Idle,
    /// Terminal is being created.
    Starting,
    /// Agent process is live in its terminal.
    Running,
    /// Terminal closed; transcript is being stabilized and parsed.
    Completing,
    /// A run failed; always exits back to `Idle`.
    Error,
}

impl ExecutionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPhase::Idle => "idle",
            ExecutionPhase::Starting => "starting",
            ExecutionPhase::Running => "running",
            ExecutionPhase::Completing => "completing",
            ExecutionPhase::Error => "error",
        }
    }

    /// Phases reachable from `self` in one step.
    ///
    /// ```text
    /// idle → starting → running → completing → idle
    ///           ↓          ↓          ↓
    ///         error ──────────────────────→ idle
    /// ```
    pub fn allowed_targets(self) -> &'static [ExecutionPhase] {
        use ExecutionPhase::*;

        match self {
            Idle => &[Starting],
            Starting => &[Running, Error],
            Running => &[Completing, Error],
            Completing => &[Idle, Error],
            Error => &[Idle],
        }
    }

    pub fn can_transition_to(self, to: ExecutionPhase) -> bool {
        self.allowed_targets().contains(&to)
    }

    /// Returns true while a run holds the orchestrator.
    pub fn is_busy(self) -> bool {
        !matches!(self, ExecutionPhase::Idle)
    }
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionPhase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(ExecutionPhase::Idle),
            "starting" => Ok(ExecutionPhase::Starting),
            "running" => Ok(ExecutionPhase::Running),
            "completing" => Ok(ExecutionPhase::Completing),
            "error" => Ok(ExecutionPhase::Error),
            other => Err(format!(
                "invalid execution phase '{other}'. valid values: idle, starting, running, completing, error"
            )),
        }
    }
}
