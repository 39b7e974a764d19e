//! Native pseudo-terminal host built on `portable-pty`.
//!
//! Each terminal gets a reader thread that mirrors output into an in-memory
//! scrollback and (optionally) the transcript file, and a waiter thread that
//! publishes a [`TerminalExit`] to subscribers once the child exits and the
//! reader has drained.

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, warn};

use crate::error::AgentError;
use crate::terminal::TerminalHost;
use crate::types::{TerminalExit, TerminalId, TerminalInfo, TerminalSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerPtySize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for RunnerPtySize {
    fn default() -> Self {
        Self {
            rows: 40,
            cols: 120,
        }
    }
}

/// Bytes of scrollback kept per terminal unless the host is told otherwise.
pub const DEFAULT_SCROLLBACK_LIMIT: usize = 8 * 1024 * 1024;

/// The most recent `limit` bytes a terminal printed.
struct Scrollback {
    bytes: VecDeque<u8>,
    limit: usize,
}

impl Scrollback {
    fn new(limit: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            limit,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.limit {
            self.bytes.clear();
            self.bytes.extend(&chunk[chunk.len() - self.limit..]);
            return;
        }
        let overflow = (self.bytes.len() + chunk.len()).saturating_sub(self.limit);
        self.bytes.drain(..overflow);
        self.bytes.extend(chunk);
    }

    fn to_string_lossy(&self) -> String {
        let (head, tail) = self.bytes.as_slices();
        let mut joined = Vec::with_capacity(self.bytes.len());
        joined.extend_from_slice(head);
        joined.extend_from_slice(tail);
        String::from_utf8_lossy(&joined).into_owned()
    }
}

struct TerminalShared {
    scrollback: Mutex<Scrollback>,
    exit: Mutex<Option<TerminalExit>>,
    subscribers: Mutex<Vec<Sender<TerminalExit>>>,
}

impl TerminalShared {
    fn new(scrollback_limit: usize) -> Self {
        Self {
            scrollback: Mutex::new(Scrollback::new(scrollback_limit)),
            exit: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn publish_exit(&self, exit: TerminalExit) {
        *lock(&self.exit) = Some(exit);
        for subscriber in lock(&self.subscribers).drain(..) {
            let _ = subscriber.send(exit);
        }
    }
}

struct PtyTerminal {
    name: String,
    pid: Option<u32>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    shared: Arc<TerminalShared>,
    // Dropping the master closes the pty; keep it alive until dispose.
    _master: Box<dyn MasterPty + Send>,
}

impl PtyTerminal {
    fn info(&self, id: TerminalId) -> TerminalInfo {
        TerminalInfo {
            id,
            name: self.name.clone(),
            pid: self.pid,
            busy: lock(&self.shared.exit).is_none(),
        }
    }
}

pub struct PtyTerminalHost {
    size: RunnerPtySize,
    scrollback_limit: usize,
    next_id: AtomicU64,
    terminals: Mutex<HashMap<TerminalId, PtyTerminal>>,
}

impl Default for PtyTerminalHost {
    fn default() -> Self {
        Self::new(RunnerPtySize::default())
    }
}

impl PtyTerminalHost {
    pub fn new(size: RunnerPtySize) -> Self {
        Self {
            size,
            scrollback_limit: DEFAULT_SCROLLBACK_LIMIT,
            next_id: AtomicU64::new(1),
            terminals: Mutex::new(HashMap::new()),
        }
    }

    /// Older output is dropped once a terminal has printed more than `bytes`.
    pub fn with_scrollback_limit(mut self, bytes: usize) -> Self {
        self.scrollback_limit = bytes;
        self
    }
}

impl TerminalHost for PtyTerminalHost {
    fn list(&self) -> Vec<TerminalInfo> {
        let mut infos: Vec<TerminalInfo> = lock(&self.terminals)
            .iter()
            .map(|(id, terminal)| terminal.info(*id))
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    fn launch(&self, spec: TerminalSpec) -> Result<TerminalInfo, AgentError> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: self.size.rows,
                cols: self.size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| AgentError::PtySetup {
                message: err.to_string(),
            })?;

        let mut command = CommandBuilder::new(&spec.program);
        command.args(&spec.args);
        command.cwd(&spec.cwd);
        for (key, value) in &spec.env {
            if key.trim().is_empty() {
                continue;
            }
            command.env(key, value);
        }

        let transcript = match &spec.transcript_path {
            Some(path) => Some(open_transcript(path)?),
            None => None,
        };

        let mut child = pair
            .slave
            .spawn_command(command)
            .map_err(|err| AgentError::Spawn {
                message: err.to_string(),
            })?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| AgentError::PtySetup {
                message: err.to_string(),
            })?;

        let id = TerminalId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pid = child.process_id();
        let killer = child.clone_killer();
        let shared = Arc::new(TerminalShared::new(self.scrollback_limit));

        let reader_shared = Arc::clone(&shared);
        let reader_handle = thread::spawn(move || pump_output(reader, transcript, &reader_shared));

        let waiter_shared = Arc::clone(&shared);
        thread::spawn(move || {
            let exit_code = match child.wait() {
                Ok(status) => i32::try_from(status.exit_code()).ok(),
                Err(err) => {
                    warn!("waiting on terminal {id} failed: {err}");
                    None
                }
            };
            let _ = reader_handle.join();
            debug!("terminal {id} exited with {exit_code:?}");
            waiter_shared.publish_exit(TerminalExit { id, exit_code });
        });

        let terminal = PtyTerminal {
            name: spec.name,
            pid,
            killer,
            shared,
            _master: pair.master,
        };
        let info = terminal.info(id);
        lock(&self.terminals).insert(id, terminal);
        Ok(info)
    }

    fn subscribe_close(&self, id: TerminalId) -> Result<Receiver<TerminalExit>, AgentError> {
        let terminals = lock(&self.terminals);
        let terminal = terminals
            .get(&id)
            .ok_or(AgentError::UnknownTerminal { id })?;

        let (tx, rx) = mpsc::channel();
        // Hold the subscriber lock while checking for an exit so a concurrent
        // publish cannot slip between the check and the registration.
        let mut subscribers = lock(&terminal.shared.subscribers);
        match *lock(&terminal.shared.exit) {
            Some(exit) => {
                let _ = tx.send(exit);
            }
            None => subscribers.push(tx),
        }
        Ok(rx)
    }

    fn capture_buffer(&self, id: TerminalId) -> Option<String> {
        let terminals = lock(&self.terminals);
        let terminal = terminals.get(&id)?;
        let scrollback = lock(&terminal.shared.scrollback);
        Some(scrollback.to_string_lossy())
    }

    fn dispose(&self, id: TerminalId) -> Result<(), AgentError> {
        let mut terminal = lock(&self.terminals)
            .remove(&id)
            .ok_or(AgentError::UnknownTerminal { id })?;
        if lock(&terminal.shared.exit).is_none() {
            if let Err(err) = terminal.killer.kill() {
                debug!("kill for terminal {id} failed: {err}");
            }
        }
        Ok(())
    }
}

fn open_transcript(path: &std::path::Path) -> Result<File, AgentError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AgentError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    File::create(path).map_err(|source| AgentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn pump_output(
    mut reader: Box<dyn Read + Send>,
    mut transcript: Option<File>,
    shared: &TerminalShared,
) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => {
                lock(&shared.scrollback).push(&chunk[..read]);
                if let Some(file) = transcript.as_mut() {
                    if let Err(err) = file.write_all(&chunk[..read]) {
                        warn!("transcript write failed, continuing in memory: {err}");
                        transcript = None;
                    }
                }
            }
            // EIO once the child side closes.
            Err(_) => break,
        }
    }
    if let Some(file) = transcript.as_mut() {
        let _ = file.flush();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(dir: &std::path::Path, script: &str) -> TerminalSpec {
        TerminalSpec {
            name: "Clauding: demo-test".to_string(),
            cwd: dir.to_path_buf(),
            program: "bash".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: vec![("CLAUDING_FEATURE_NAME".to_string(), "demo".to_string())],
            transcript_path: Some(dir.join("out.txt")),
        }
    }

    #[test]
    fn launched_terminal_mirrors_output_and_reports_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = PtyTerminalHost::default();
        let info = host
            .launch(spec(dir.path(), "echo \"hello $CLAUDING_FEATURE_NAME\"; exit 3"))
            .expect("launch");
        let rx = host.subscribe_close(info.id).expect("subscribe");

        let exit = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("terminal should close");
        assert_eq!(exit.id, info.id);
        assert_eq!(exit.exit_code, Some(3));

        let transcript = fs::read_to_string(dir.path().join("out.txt")).expect("transcript");
        assert!(transcript.contains("hello demo"));
        assert!(host
            .capture_buffer(info.id)
            .expect("scrollback")
            .contains("hello demo"));

        let listed = host.find_by_name("Clauding: demo-test").expect("listed");
        assert!(!listed.busy);
    }

    #[test]
    fn late_subscriber_is_notified_immediately() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = PtyTerminalHost::default();
        let info = host.launch(spec(dir.path(), "true")).expect("launch");
        host.subscribe_close(info.id)
            .expect("subscribe")
            .recv_timeout(Duration::from_secs(10))
            .expect("first close");

        let again = host.subscribe_close(info.id).expect("subscribe again");
        assert!(again.recv_timeout(Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn scrollback_keeps_only_the_newest_bytes() {
        let mut scrollback = Scrollback::new(8);
        scrollback.push(b"hello ");
        scrollback.push(b"world");
        assert_eq!(scrollback.to_string_lossy(), "lo world");

        scrollback.push(b"0123456789");
        assert_eq!(scrollback.to_string_lossy(), "23456789");

        let mut disabled = Scrollback::new(0);
        disabled.push(b"anything");
        assert_eq!(disabled.to_string_lossy(), "");
    }

    #[test]
    fn exited_terminal_scrollback_is_bounded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = PtyTerminalHost::default().with_scrollback_limit(64);
        let info = host
            .launch(spec(
                dir.path(),
                "for i in $(seq 1 200); do echo line-$i; done; echo tail-marker",
            ))
            .expect("launch");
        host.subscribe_close(info.id)
            .expect("subscribe")
            .recv_timeout(Duration::from_secs(10))
            .expect("terminal should close");

        let captured = host.capture_buffer(info.id).expect("scrollback");
        assert!(captured.len() <= 64);
        assert!(captured.contains("tail-marker"));
        let has_first_line = |text: &str| text.lines().any(|line| line.trim_end() == "line-1");
        assert!(!has_first_line(&captured));

        let transcript = fs::read_to_string(dir.path().join("out.txt")).expect("transcript");
        assert!(has_first_line(&transcript));
    }

    #[test]
    fn dispose_kills_running_terminal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = PtyTerminalHost::default();
        let info = host.launch(spec(dir.path(), "sleep 30")).expect("launch");
        let rx = host.subscribe_close(info.id).expect("subscribe");
        assert!(host.find_by_name("Clauding: demo-test").unwrap().busy);

        host.dispose(info.id).expect("dispose");
        assert!(rx.recv_timeout(Duration::from_secs(10)).is_ok());
        assert!(host.find_by_name("Clauding: demo-test").is_none());
        assert!(matches!(
            host.dispose(info.id),
            Err(AgentError::UnknownTerminal { .. })
        ));
    }
}
