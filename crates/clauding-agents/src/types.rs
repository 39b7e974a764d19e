use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-call replacement for the configured agent.
///
/// Fields use "defined" semantics: `Some("")` is a deliberate value (for
/// flags: run without any), `None` falls back to the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentOverride {
    pub id: Option<String>,
    pub executable: Option<String>,
    pub flags: Option<String>,
}

/// Agent invocation after overrides were applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAgent {
    pub id: String,
    pub executable: String,
    pub flags: String,
}

/// A fully built agent command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCommand {
    pub executable: String,
    /// Raw shell fragment inserted verbatim; `None` when there are no flags.
    pub flags: Option<String>,
    /// Literal prompt text; `None` for interactive sessions.
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerminalId(pub u64);

impl std::fmt::Display for TerminalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything a host needs to open a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSpec {
    pub name: String,
    pub cwd: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Raw terminal output is mirrored here while the process runs.
    pub transcript_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalInfo {
    pub id: TerminalId,
    pub name: String,
    pub pid: Option<u32>,
    /// False once the process inside the terminal has exited.
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalExit {
    pub id: TerminalId,
    pub exit_code: Option<i32>,
}
