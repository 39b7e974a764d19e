use clauding_core::config::AgentConfig;

use crate::types::{AgentCommand, AgentOverride, ResolvedAgent};
use crate::util::shell_quote;

/// Apply `override_` on top of the configured agent, field by field.
///
/// Only `None` falls back to the default; an explicitly empty string is kept.
pub fn resolve_agent(defaults: &AgentConfig, override_: Option<&AgentOverride>) -> ResolvedAgent {
    let Some(over) = override_ else {
        return ResolvedAgent {
            id: defaults.id.clone(),
            executable: defaults.executable.clone(),
            flags: defaults.flags.clone(),
        };
    };

    ResolvedAgent {
        id: over.id.clone().unwrap_or_else(|| defaults.id.clone()),
        executable: over
            .executable
            .clone()
            .unwrap_or_else(|| defaults.executable.clone()),
        flags: over.flags.clone().unwrap_or_else(|| defaults.flags.clone()),
    }
}

impl ResolvedAgent {
    pub fn build_command(&self, prompt: Option<&str>) -> AgentCommand {
        let flags = self.flags.trim();
        AgentCommand {
            executable: self.executable.clone(),
            flags: (!flags.is_empty()).then(|| flags.to_string()),
            prompt: prompt.map(str::to_string),
        }
    }
}

impl AgentCommand {
    /// Shell command line: `'<exe>'[ <flags>][ '<prompt>']`.
    pub fn render(&self) -> String {
        let mut rendered = shell_quote(&self.executable);
        if let Some(flags) = &self.flags {
            rendered.push(' ');
            rendered.push_str(flags);
        }
        if let Some(prompt) = &self.prompt {
            rendered.push(' ');
            rendered.push_str(&shell_quote(prompt));
        }
        rendered
    }
}
