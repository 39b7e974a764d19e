use std::path::PathBuf;

use crate::types::TerminalId;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("pty setup failed: {message}")]
    PtySetup { message: String },
    #[error("agent spawn failed: {message}")]
    Spawn { message: String },
    #[error("agent runtime error: {message}")]
    Runtime { message: String },
    #[error("unknown terminal {id}")]
    UnknownTerminal { id: TerminalId },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
