//! Execution state machine for one orchestrator.
//!
//! Holds the current [`ExecutionPhase`] plus whatever the run attached to it,
//! and mirrors every transition of [`ExecutionStateMachine::run_to_completion`]
//! into the session's status file.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use clauding_agents::status_store::StatusStore;
use clauding_agents::types::TerminalId;
use clauding_core::state::ExecutionPhase;
use clauding_core::status::{AgentStatusRecord, StatusEventType};
use clauding_core::types::SessionId;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("invalid execution state transition: {from} -> {to}")]
    InvalidTransition {
        from: ExecutionPhase,
        to: ExecutionPhase,
    },
    #[error("an execution is already in progress (state: {phase})")]
    AlreadyRunning { phase: ExecutionPhase },
}

/// Data attached to the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionState {
    pub phase: ExecutionPhase,
    pub terminal_id: Option<TerminalId>,
    pub output_path: Option<PathBuf>,
    pub session_id: Option<SessionId>,
    pub feature_name: Option<String>,
    pub last_error: Option<String>,
}

/// Fields to merge on a transition; `None` leaves the current value alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttachData {
    pub terminal_id: Option<TerminalId>,
    pub output_path: Option<PathBuf>,
    pub session_id: Option<SessionId>,
    pub feature_name: Option<String>,
    pub error: Option<String>,
}

impl ExecutionState {
    fn merge(&mut self, data: AttachData) {
        if let Some(id) = data.terminal_id {
            self.terminal_id = Some(id);
        }
        if let Some(path) = data.output_path {
            self.output_path = Some(path);
        }
        if let Some(session) = data.session_id {
            self.session_id = Some(session);
        }
        if let Some(feature) = data.feature_name {
            self.feature_name = Some(feature);
        }
        if let Some(error) = data.error {
            self.last_error = Some(error);
        }
    }
}

/// Identity of a run, fixed before anything is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub feature_name: String,
    pub status_dir: PathBuf,
    pub session_id: SessionId,
}

/// What `create` hands back once the terminal exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedRun {
    pub terminal_id: TerminalId,
    pub output_path: PathBuf,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub output: String,
    pub output_file: PathBuf,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Default)]
pub struct ExecutionStateMachine {
    state: Mutex<ExecutionState>,
}

impl ExecutionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.lock().phase
    }

    pub fn snapshot(&self) -> ExecutionState {
        self.lock().clone()
    }

    pub fn transition(&self, to: ExecutionPhase, data: AttachData) -> Result<(), StateMachineError> {
        let mut state = self.lock();
        apply_transition(&mut state, to, data)
    }

    /// Drive one run through starting → running → completing → idle.
    ///
    /// `create` launches the terminal, `wait` blocks until it closes and
    /// returns the exit code, `cleanup` turns the output file into the
    /// returned output text. Any failure in those steps moves the machine
    /// through `error` back to `idle` and is returned unchanged.
    pub fn run_to_completion<E, C, W, F>(
        &self,
        context: &RunContext,
        create: C,
        wait: W,
        cleanup: F,
    ) -> Result<RunOutcome, E>
    where
        E: From<StateMachineError> + Display,
        C: FnOnce() -> Result<LaunchedRun, E>,
        W: FnOnce(TerminalId) -> Result<Option<i32>, E>,
        F: FnOnce(&Path) -> Result<String, E>,
    {
        let store = StatusStore::new(&context.status_dir);
        {
            let mut state = self.lock();
            if state.phase != ExecutionPhase::Idle {
                return Err(StateMachineError::AlreadyRunning { phase: state.phase }.into());
            }
            *state = ExecutionState::default();
            apply_transition(
                &mut state,
                ExecutionPhase::Starting,
                AttachData {
                    session_id: Some(context.session_id.clone()),
                    feature_name: Some(context.feature_name.clone()),
                    ..AttachData::default()
                },
            )?;
        }
        self.persist(&store, context, ExecutionPhase::Starting, None, None);

        let mut pid = None;
        let result = self.drive(&store, context, &mut pid, create, wait, cleanup);
        if let Err(err) = &result {
            self.fail(&store, context, pid, &err.to_string());
        }
        result
    }

    fn drive<E, C, W, F>(
        &self,
        store: &StatusStore,
        context: &RunContext,
        pid: &mut Option<u32>,
        create: C,
        wait: W,
        cleanup: F,
    ) -> Result<RunOutcome, E>
    where
        E: From<StateMachineError> + Display,
        C: FnOnce() -> Result<LaunchedRun, E>,
        W: FnOnce(TerminalId) -> Result<Option<i32>, E>,
        F: FnOnce(&Path) -> Result<String, E>,
    {
        let launched = create()?;
        *pid = launched.pid;

        self.transition(
            ExecutionPhase::Running,
            AttachData {
                terminal_id: Some(launched.terminal_id),
                output_path: Some(launched.output_path.clone()),
                ..AttachData::default()
            },
        )?;
        self.persist(store, context, ExecutionPhase::Running, *pid, None);

        let exit_code = wait(launched.terminal_id)?;

        self.transition(ExecutionPhase::Completing, AttachData::default())?;
        self.persist(store, context, ExecutionPhase::Completing, *pid, None);
        let output = cleanup(&launched.output_path)?;

        self.transition(ExecutionPhase::Idle, AttachData::default())?;
        self.persist_final(store, context, *pid);

        Ok(RunOutcome {
            success: true,
            output,
            output_file: launched.output_path,
            exit_code,
        })
    }

    /// Move through `error` to `idle`. Only the error is persisted so the
    /// status file keeps showing it.
    fn fail(&self, store: &StatusStore, context: &RunContext, pid: Option<u32>, error: &str) {
        {
            let mut state = self.lock();
            let data = AttachData {
                error: Some(error.to_string()),
                ..AttachData::default()
            };
            if apply_transition(&mut state, ExecutionPhase::Error, data).is_err() {
                state.last_error = Some(error.to_string());
            }
        }
        self.persist(store, context, ExecutionPhase::Error, pid, Some(error));

        let mut state = self.lock();
        if apply_transition(&mut state, ExecutionPhase::Idle, AttachData::default()).is_err() {
            state.phase = ExecutionPhase::Idle;
        }
    }

    fn persist(
        &self,
        store: &StatusStore,
        context: &RunContext,
        phase: ExecutionPhase,
        pid: Option<u32>,
        error: Option<&str>,
    ) {
        let mut record = AgentStatusRecord::new(
            StatusEventType::for_phase(phase),
            context.feature_name.clone(),
            context.session_id.clone(),
            pid.unwrap_or_else(std::process::id),
        )
        .with_state(phase);
        if let Some(error) = error {
            record = record.with_error(error);
        }
        store.write_logged(&record);
    }

    /// Closing `SessionEnd`, unless the agent's hook already reported a
    /// `SessionError` for this session.
    fn persist_final(&self, store: &StatusStore, context: &RunContext, pid: Option<u32>) {
        if let Ok(Some(existing)) = store.read(&context.session_id) {
            if existing.event_type == StatusEventType::SessionError && existing.state.is_none() {
                info!(
                    session = %context.session_id,
                    error = existing.error.as_deref().unwrap_or(""),
                    "keeping hook-reported session error"
                );
                return;
            }
        }
        self.persist(store, context, ExecutionPhase::Idle, pid, None);
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_transition(
    state: &mut ExecutionState,
    to: ExecutionPhase,
    data: AttachData,
) -> Result<(), StateMachineError> {
    let from = state.phase;
    if !from.can_transition_to(to) {
        return Err(StateMachineError::InvalidTransition { from, to });
    }
    debug!("execution state {from} -> {to}");
    state.phase = to;
    state.merge(data);
    Ok(())
}
