//! Agent execution orchestrator.
//!
//! Turns "run command X for feature Y" into a live agent terminal and a
//! captured transcript, keeping the status file in step with the run.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use clauding_agents::adapter::resolve_agent;
use clauding_agents::error::AgentError;
use clauding_agents::stability::{await_stability, StabilityOptions, StabilityOutcome};
use clauding_agents::terminal::{terminal_name, TerminalHost};
use clauding_agents::types::{AgentOverride, TerminalExit, TerminalId, TerminalSpec};
use clauding_core::config::ClaudingConfig;
use clauding_core::types::{FeatureLayout, SessionId};
use clauding_git::command::GitCli;
use clauding_git::repo::{discover_work_tree, short_head_hash};
use clauding_transcript::parse::SessionParser;
use clauding_transcript::render::write_projections;
use tracing::{debug, info, warn};

use crate::commands::{find_command, CommandClass, CommandSpec, COMMANDS};
use crate::env_inject::{generate_session_id, SessionEnv};
use crate::prompt_builder::{build_prompt, ConflictContext, PromptInputs};
use crate::state_machine::{
    ExecutionStateMachine, LaunchedRun, RunContext, RunOutcome, StateMachineError,
};
use crate::variables::{VariableContext, VariableResolver};

pub type ExecutionResult = RunOutcome;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },
    #[error(
        "'{terminal}' is still running; wait for it to finish or close it before starting another run"
    )]
    ConcurrencyConflict { terminal: String },
    #[error(transparent)]
    State(#[from] StateMachineError),
    #[error(transparent)]
    Terminal(#[from] AgentError),
    #[error("failed to prepare launcher {path}: {source}")]
    Launcher {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecuteRequest {
    /// Registry name or id.
    pub command: String,
    pub worktree: PathBuf,
    /// Defaults to the worktree directory name.
    pub feature_name: Option<String>,
    pub conflict: Option<ConflictContext>,
    pub agent_override: Option<AgentOverride>,
}

/// Bookkeeping for a terminal this orchestrator launched.
#[derive(Debug, Clone)]
struct ActiveRun {
    output_path: PathBuf,
}

pub struct AgentOrchestrator {
    config: ClaudingConfig,
    host: Arc<dyn TerminalHost>,
    git: GitCli,
    parser: Option<SessionParser>,
    state: ExecutionStateMachine,
    active: Mutex<HashMap<TerminalId, ActiveRun>>,
}

impl AgentOrchestrator {
    /// The parser collaborator is installed when `config.parser.enabled`.
    pub fn new(config: ClaudingConfig, host: Arc<dyn TerminalHost>) -> Self {
        let parser = config
            .parser
            .enabled
            .then(|| SessionParser::new(config.parser.markers.clone()));
        Self {
            config,
            host,
            git: GitCli::default(),
            parser,
            state: ExecutionStateMachine::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClaudingConfig {
        &self.config
    }

    pub fn state(&self) -> &ExecutionStateMachine {
        &self.state
    }

    pub fn execute(&self, request: ExecuteRequest) -> Result<ExecutionResult, OrchestratorError> {
        let command = find_command(&request.command).ok_or_else(|| {
            OrchestratorError::UnknownCommand {
                name: request.command.clone(),
            }
        })?;
        let layout = FeatureLayout::for_worktree(&request.worktree);
        let feature = request
            .feature_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| layout.default_feature_name());

        if let Some(required) = command.required_file {
            let path = layout.metadata_dir.join(required);
            if !path.is_file() {
                warn!(command = command.id, path = %path.display(), "required file is missing");
            }
        }

        let agent = resolve_agent(&self.config.agent, request.agent_override.as_ref());
        let output_path = layout.outputs_dir.join(output_file_name(
            command.output_prefix,
            Local::now(),
            short_head_hash(&layout.worktree, &self.git).as_deref(),
        ));

        let variables = self.variable_context(&layout, &feature);
        let prompt = build_prompt(
            &PromptInputs {
                command,
                agent_id: &agent.id,
                agent_prompts: &self.config.agent_prompts,
                conflict: request.conflict.as_ref(),
                variables: &variables,
            },
            &mut VariableResolver::new(),
        );
        let command_line = agent.build_command(prompt.as_deref()).render();

        let name = terminal_name(&self.config.terminal.product_prefix, &feature, command.id);
        self.clear_previous_terminal(&name)?;

        let session_id = generate_session_id(&feature);
        let env = SessionEnv {
            feature_name: feature.clone(),
            worktree: layout.worktree.clone(),
            session_id: session_id.clone(),
            command: command.name.to_string(),
        };
        let context = RunContext {
            feature_name: feature.clone(),
            status_dir: layout.outputs_dir.clone(),
            session_id: session_id.clone(),
        };
        let script = launcher_script_path(&layout.outputs_dir, &session_id);

        info!(
            command = command.id,
            feature = %feature,
            session = %session_id,
            output = %output_path.display(),
            "starting agent run"
        );

        let result = self.state.run_to_completion(
            &context,
            || self.launch(&name, &layout, &env, &script, &command_line, &output_path),
            |id| Ok(self.wait_for_close(id)),
            |output| {
                remove_launcher(&script);
                Ok(self.finish_output(output))
            },
        );
        if result.is_err() {
            remove_launcher(&script);
        }
        let result = result?;

        if command.class == CommandClass::Implement {
            write_wrap_up_marker(&layout, &session_id, command);
        }
        info!(
            command = command.id,
            feature = %feature,
            exit_code = ?result.exit_code,
            "agent run finished"
        );
        Ok(result)
    }

    /// Capture, flush and dispose every terminal belonging to `feature`.
    /// Runs waiting on those terminals then complete normally.
    pub fn kill_feature_terminals(&self, feature: &str) -> usize {
        let names: Vec<String> = COMMANDS
            .iter()
            .map(|spec| terminal_name(&self.config.terminal.product_prefix, feature, spec.id))
            .collect();

        let mut killed = 0;
        for info in self.host.list() {
            if !names.contains(&info.name) {
                continue;
            }
            let output_path = lock(&self.active)
                .get(&info.id)
                .map(|run| run.output_path.clone());
            if let (Some(buffer), Some(path)) = (self.host.capture_buffer(info.id), output_path) {
                flush_captured_buffer(&path, &buffer);
            }
            match self.host.dispose(info.id) {
                Ok(()) => killed += 1,
                Err(err) => warn!(terminal = %info.name, "dispose failed: {err}"),
            }
        }
        info!(feature, killed, "killed feature terminals");
        killed
    }

    fn variable_context(&self, layout: &FeatureLayout, feature: &str) -> VariableContext {
        let project_root = discover_work_tree(&layout.worktree, &self.git)
            .unwrap_or_else(|_| layout.worktree.clone());
        VariableContext {
            feature_name: feature.to_string(),
            worktree: layout.worktree.clone(),
            project_root,
            working_directory: layout.worktree.clone(),
            outputs_dir: layout.outputs_dir.clone(),
        }
    }

    fn clear_previous_terminal(&self, name: &str) -> Result<(), OrchestratorError> {
        let Some(existing) = self.host.find_by_name(name) else {
            return Ok(());
        };
        if existing.busy {
            return Err(OrchestratorError::ConcurrencyConflict {
                terminal: name.to_string(),
            });
        }
        debug!(terminal = name, "disposing idle terminal from a previous run");
        if let Err(err) = self.host.dispose(existing.id) {
            warn!(terminal = name, "failed to dispose idle terminal: {err}");
        }
        lock(&self.active).remove(&existing.id);
        Ok(())
    }

    fn launch(
        &self,
        name: &str,
        layout: &FeatureLayout,
        env: &SessionEnv,
        script: &Path,
        command_line: &str,
        output_path: &Path,
    ) -> Result<LaunchedRun, OrchestratorError> {
        write_launcher(script, command_line)?;
        let info = self.host.launch(TerminalSpec {
            name: name.to_string(),
            cwd: layout.worktree.clone(),
            program: self.config.terminal.shell.clone(),
            args: vec![script.display().to_string()],
            env: env.to_env_vec(),
            transcript_path: Some(output_path.to_path_buf()),
        })?;
        lock(&self.active).insert(
            info.id,
            ActiveRun {
                output_path: output_path.to_path_buf(),
            },
        );
        Ok(LaunchedRun {
            terminal_id: info.id,
            output_path: output_path.to_path_buf(),
            pid: info.pid,
        })
    }

    /// Block on the host's close notification. A dropped channel counts as
    /// a close with no exit code.
    fn wait_for_close(&self, id: TerminalId) -> Option<i32> {
        let exit = match self.host.subscribe_close(id) {
            Ok(rx) => rx.recv().unwrap_or_else(|_| {
                debug!("close channel for terminal {id} dropped");
                TerminalExit {
                    id,
                    exit_code: None,
                }
            }),
            Err(err) => {
                warn!("cannot watch terminal {id}, treating it as closed: {err}");
                TerminalExit {
                    id,
                    exit_code: None,
                }
            }
        };
        lock(&self.active).remove(&id);
        exit.exit_code
    }

    /// Settle, wait for the transcript to stop growing, then project it.
    fn finish_output(&self, output: &Path) -> String {
        let settle = self.config.stability.settle_delay();
        if !settle.is_zero() {
            thread::sleep(settle);
        }

        match await_stability(output, StabilityOptions::from(&self.config.stability)) {
            StabilityOutcome::Missing => {
                warn!(path = %output.display(), "agent produced no transcript");
                return String::new();
            }
            StabilityOutcome::TimedOut { size } => {
                warn!(path = %output.display(), size, "transcript still growing, parsing anyway");
            }
            StabilityOutcome::Stable { .. } => {}
        }

        if let Some(parser) = &self.parser {
            if let Err(err) = write_projections(output, parser) {
                warn!("session projections not written: {err}");
            }
        }

        match fs::read(output) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                warn!(path = %output.display(), "transcript unreadable: {err}");
                String::new()
            }
        }
    }
}

/// `{prefix}-{YYYYMMDD-HHMMSS}[-{hash}].txt`
pub fn output_file_name(prefix: &str, at: DateTime<Local>, short_hash: Option<&str>) -> String {
    let stamp = at.format("%Y%m%d-%H%M%S");
    match short_hash {
        Some(hash) if !hash.is_empty() => format!("{prefix}-{stamp}-{hash}.txt"),
        _ => format!("{prefix}-{stamp}.txt"),
    }
}

fn launcher_script_path(outputs_dir: &Path, session_id: &SessionId) -> PathBuf {
    outputs_dir.join(format!(".launch-{session_id}.sh"))
}

fn write_launcher(script: &Path, command_line: &str) -> Result<(), OrchestratorError> {
    let to_err = |source| OrchestratorError::Launcher {
        path: script.to_path_buf(),
        source,
    };
    if let Some(parent) = script.parent() {
        fs::create_dir_all(parent).map_err(to_err)?;
    }
    fs::write(script, format!("#!/bin/sh\n{command_line}\n")).map_err(to_err)
}

fn remove_launcher(script: &Path) {
    match fs::remove_file(script) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %script.display(), "failed to remove launcher: {err}"),
    }
}

/// Write a captured scrollback unless the transcript on disk already holds
/// at least as much.
fn flush_captured_buffer(path: &Path, buffer: &str) {
    let on_disk = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
    if buffer.len() as u64 <= on_disk {
        return;
    }
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(path = %parent.display(), "failed to create transcript directory: {err}");
        }
    }
    if let Err(err) = fs::write(path, buffer) {
        warn!(path = %path.display(), "failed to flush captured buffer: {err}");
    }
}

fn write_wrap_up_marker(layout: &FeatureLayout, session_id: &SessionId, command: &CommandSpec) {
    let marker = layout.wrap_up_marker();
    let body = serde_json::json!({
        "command": command.id,
        "sessionId": session_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let result = fs::create_dir_all(&layout.metadata_dir)
        .and_then(|()| fs::write(&marker, body.to_string()));
    match result {
        Ok(()) => debug!(path = %marker.display(), "wrap-up marker written"),
        Err(err) => warn!(path = %marker.display(), "failed to write wrap-up marker: {err}"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
