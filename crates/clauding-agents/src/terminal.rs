//! Terminal host seam.
//!
//! The orchestrator never talks to a pty directly; it goes through
//! [`TerminalHost`] so that editor-integrated terminals, the native pty host
//! and test doubles are interchangeable.

use std::sync::mpsc::Receiver;

use crate::error::AgentError;
use crate::types::{TerminalExit, TerminalId, TerminalInfo, TerminalSpec};

pub trait TerminalHost: Send + Sync {
    fn list(&self) -> Vec<TerminalInfo>;

    fn find_by_name(&self, name: &str) -> Option<TerminalInfo> {
        self.list().into_iter().find(|info| info.name == name)
    }

    fn launch(&self, spec: TerminalSpec) -> Result<TerminalInfo, AgentError>;

    /// Channel that receives exactly one [`TerminalExit`] when the terminal
    /// closes. Subscribing after the close delivers immediately.
    fn subscribe_close(&self, id: TerminalId) -> Result<Receiver<TerminalExit>, AgentError>;

    /// Live scrollback, for hosts that can read it back.
    fn capture_buffer(&self, _id: TerminalId) -> Option<String> {
        None
    }

    fn dispose(&self, id: TerminalId) -> Result<(), AgentError>;
}

/// Terminal name shared by every run of `command` for `feature`.
pub fn terminal_name(product_prefix: &str, feature: &str, command: &str) -> String {
    format!("{product_prefix}: {feature}-{command}")
}
