//! Static registry of agent commands a feature can run.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandClass {
    /// No prompt; the user drives the agent.
    Interactive,
    Generic,
    /// Completion moves the feature to wrap-up.
    Implement,
    FixTests,
    ResolveConflicts,
}

impl CommandClass {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandClass::Interactive => "interactive",
            CommandClass::Generic => "generic",
            CommandClass::Implement => "implement",
            CommandClass::FixTests => "fix-tests",
            CommandClass::ResolveConflicts => "resolve-conflicts",
        }
    }
}

impl std::fmt::Display for CommandClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    /// Display name callers pass in; also exported as `CLAUDING_COMMAND`.
    pub name: &'static str,
    /// Stable id used in terminal names.
    pub id: &'static str,
    pub prompt_template: Option<&'static str>,
    /// Relative to the feature metadata directory.
    pub required_file: Option<&'static str>,
    pub output_prefix: &'static str,
    pub system_prompt: Option<&'static str>,
    pub class: CommandClass,
}

impl CommandSpec {
    pub fn is_interactive(&self) -> bool {
        self.prompt_template.is_none()
    }
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "Create Plan",
        id: "create-plan",
        prompt_template: Some(
            "Read the feature prompt at {file:.clauding/prompt.md} for feature {feature-name}. \
             Explore the code in {worktree} and write a step-by-step implementation plan to \
             .clauding/plan.md. Do not change any source files.",
        ),
        required_file: Some("prompt.md"),
        output_prefix: "create-plan",
        system_prompt: None,
        class: CommandClass::Generic,
    },
    CommandSpec {
        name: "Implement Plan",
        id: "implement-plan",
        prompt_template: Some(
            "Implement the plan for feature {feature-name}:\n\n{file:.clauding/plan.md}\n\n\
             Work in {worktree}. Run the tests when you are done.",
        ),
        required_file: Some("plan.md"),
        output_prefix: "implement-plan",
        system_prompt: Some(
            "You are implementing an approved plan. Follow it step by step and keep \
             changes scoped to the plan.",
        ),
        class: CommandClass::Implement,
    },
    CommandSpec {
        name: "Wrap Up",
        id: "wrap-up",
        prompt_template: Some(
            "Feature {feature-name} is implemented. Review the diff in {worktree}, clean up \
             leftovers, update documentation and summarise the change.",
        ),
        required_file: None,
        output_prefix: "wrap-up",
        system_prompt: None,
        class: CommandClass::Generic,
    },
    CommandSpec {
        name: "Fix Failing Tests",
        id: "fix-tests",
        prompt_template: Some(
            "Tests are failing for feature {feature-name}. Run the test suite in {worktree}, \
             find the failures and fix them.",
        ),
        required_file: None,
        output_prefix: "fix-tests",
        system_prompt: None,
        class: CommandClass::FixTests,
    },
    CommandSpec {
        name: "Resolve Conflicts",
        id: "resolve-conflicts",
        prompt_template: Some(
            "Resolve the merge conflicts in {worktree} for feature {feature-name}, keeping \
             the intent of both sides, then run the tests.",
        ),
        required_file: None,
        output_prefix: "resolve-conflicts",
        system_prompt: None,
        class: CommandClass::ResolveConflicts,
    },
    CommandSpec {
        name: "Interactive Session",
        id: "interactive",
        prompt_template: None,
        required_file: None,
        output_prefix: "interactive",
        system_prompt: None,
        class: CommandClass::Interactive,
    },
];

/// Look up a command by display name or id, ignoring case.
pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    let wanted = name.trim();
    COMMANDS.iter().find(|spec| {
        spec.name.eq_ignore_ascii_case(wanted) || spec.id.eq_ignore_ascii_case(wanted)
    })
}
