//! Markdown and JSON projections of parsed session events.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use clauding_core::types::{SessionEvent, SessionEventKind};
use tracing::debug;

use crate::parse::SessionParser;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("failed to read transcript {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write projection {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode session events: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

/// Paths written by [`write_projections`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projections {
    pub markdown: PathBuf,
    pub json: PathBuf,
    pub event_count: usize,
}

fn heading(kind: SessionEventKind) -> &'static str {
    match kind {
        SessionEventKind::UserInput => "User",
        SessionEventKind::AgentResponse => "Agent",
        SessionEventKind::Status => "Status",
        SessionEventKind::Prompt => "Prompt",
    }
}

pub fn to_markdown(events: &[SessionEvent], title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {title}");
    if let Some(started) = events.iter().find_map(|event| event.timestamp.as_deref()) {
        let _ = writeln!(out, "\n_Started: {started}_");
    }
    if events.is_empty() {
        out.push_str("\n_No conversation recovered._\n");
        return out;
    }

    for event in events {
        let _ = writeln!(out, "\n## {}\n", heading(event.kind));
        match event.kind {
            SessionEventKind::UserInput | SessionEventKind::Prompt => {
                let fence = fence_for(&event.content);
                let _ = writeln!(out, "{fence}\n{}\n{fence}", event.content);
            }
            SessionEventKind::AgentResponse | SessionEventKind::Status => {
                let _ = writeln!(out, "{}", event.content);
            }
        }
    }
    out
}

/// A backtick fence longer than any run inside `content`.
fn fence_for(content: &str) -> String {
    let longest = content
        .split(|ch: char| ch != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

/// The events as a bare JSON array; each carries its own timestamp.
pub fn to_json(events: &[SessionEvent]) -> Result<String, TranscriptError> {
    serde_json::to_string_pretty(events).map_err(|source| TranscriptError::Encode { source })
}

/// Parse `transcript` and write `{base}.md` and `{base}.json` beside it.
pub fn write_projections(
    transcript: &Path,
    parser: &SessionParser,
) -> Result<Projections, TranscriptError> {
    let bytes = fs::read(transcript).map_err(|source| TranscriptError::Read {
        path: transcript.to_path_buf(),
        source,
    })?;
    let raw = String::from_utf8_lossy(&bytes);
    let parsed = parser.parse(&raw);

    let title = transcript
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());

    let markdown = transcript.with_extension("md");
    let json = transcript.with_extension("json");
    write_file(&markdown, to_markdown(&parsed.events, &title))?;
    write_file(&json, to_json(&parsed.events)?)?;

    debug!(
        transcript = %transcript.display(),
        events = parsed.events.len(),
        "wrote session projections"
    );
    Ok(Projections {
        markdown,
        json,
        event_count: parsed.events.len(),
    })
}

fn write_file(path: &Path, body: String) -> Result<(), TranscriptError> {
    fs::write(path, body).map_err(|source| TranscriptError::Write {
        path: path.to_path_buf(),
        source,
    })
}
