//! Assembles the literal prompt handed to the agent for a command.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::commands::{CommandClass, CommandSpec};
use crate::variables::{VariableContext, VariableResolver};

/// Branches and files involved in a merge the agent should resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictContext {
    pub source_branch: String,
    pub target_branch: String,
    pub conflicted_files: Vec<String>,
}

pub struct PromptInputs<'a> {
    pub command: &'a CommandSpec,
    pub agent_id: &'a str,
    /// Per-agent system prompts from config, keyed by agent id.
    pub agent_prompts: &'a BTreeMap<String, String>,
    pub conflict: Option<&'a ConflictContext>,
    pub variables: &'a VariableContext,
}

/// `None` for interactive commands.
pub fn build_prompt(inputs: &PromptInputs<'_>, resolver: &mut VariableResolver) -> Option<String> {
    let template = inputs.command.prompt_template?;

    let body = match (inputs.command.class, inputs.conflict) {
        (CommandClass::FixTests, _) => match resolver.latest_test_run(inputs.variables) {
            Some(results) => fix_tests_prompt(inputs.variables, &results.display().to_string()),
            None => resolver.resolve(template, inputs.variables),
        },
        (CommandClass::ResolveConflicts, Some(conflict)) => {
            conflict_prompt(inputs.variables, conflict)
        }
        _ => resolver.resolve(template, inputs.variables),
    };

    let system = inputs
        .agent_prompts
        .get(inputs.agent_id)
        .map(String::as_str)
        .filter(|prompt| !prompt.trim().is_empty())
        .or(inputs.command.system_prompt);

    Some(match system {
        Some(system) => format!("{}\n\n{body}", system.trim_end()),
        None => body,
    })
}

fn fix_tests_prompt(variables: &VariableContext, results_path: &str) -> String {
    format!(
        "Tests are failing for feature {feature}. The latest test output is in {results_path}. \
         Read it, fix the failures in {worktree} and re-run the tests until they pass.",
        feature = variables.feature_name,
        worktree = variables.worktree.display(),
    )
}

fn conflict_prompt(variables: &VariableContext, conflict: &ConflictContext) -> String {
    let mut prompt = format!(
        "Merging `{source}` into `{target}` for feature {feature} left conflicts in {worktree}.\n",
        source = conflict.source_branch,
        target = conflict.target_branch,
        feature = variables.feature_name,
        worktree = variables.worktree.display(),
    );
    if conflict.conflicted_files.is_empty() {
        prompt.push_str("\nFind the conflicted files with `git status`.\n");
    } else {
        prompt.push_str("\nConflicted files:\n");
        for file in &conflict.conflicted_files {
            prompt.push_str(&format!("- {file}\n"));
        }
    }
    prompt.push_str(
        "\nResolve every conflict keeping the intent of both branches, remove the conflict \
         markers, stage the files and run the tests.",
    );
    prompt
}
