//! Line scanner that turns a rendered agent TUI capture into session events.
//!
//! The capture is a redrawn terminal UI, not a protocol: the same frame shows
//! up many times and most lines are chrome. The scanner only emits blocks it
//! is confident about and silently drops everything else.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

pub use clauding_core::config::ParserMarkers;
use clauding_core::types::{SessionEvent, SessionEventKind};

use crate::ansi::{has_escapes, strip_ansi, strip_ansi_keep_indent};

const MIN_USER_INPUT_CHARS: usize = 6;
const MIN_RESPONSE_CHARS: usize = 11;
const MAX_BLANK_RUN: usize = 2;
const RECENT_CONTENT_WINDOW: usize = 10;

static SCRIPT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Script started on (.+?) \[").expect("header pattern is valid")
});
static PROMPT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s+\S").expect("prompt pattern is valid"));
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^Try ["']"#).expect("placeholder pattern is valid"));
static FRAME_CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    // erase line/screen, cursor up, cursor home/absolute position
    Regex::new(r"\x1b\[(?:[0-2]?K|[0-3]?J|\d*A|\d*;?\d*H)").expect("frame pattern is valid")
});

/// Glyphs the agent TUI uses in front of response blocks and list items.
const BULLET_GLYPHS: &[char] = &['⏺', '●', '•', '◦', '∙'];
/// Box-drawing characters framing the input area.
const FRAME_GLYPHS: &[char] = &['╭', '╰', '│', '─'];

/// Result of one parse pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedSession {
    /// From the `Script started on ...` header, when present.
    pub started_at: Option<String>,
    pub events: Vec<SessionEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionParser {
    markers: ParserMarkers,
}

/// One input line in both of its stripped forms.
struct ScanLine<'a> {
    raw: &'a str,
    clean: String,
    indented: String,
}

impl<'a> ScanLine<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            clean: strip_ansi(raw),
            indented: strip_ansi_keep_indent(raw),
        }
    }

    fn is_blank(&self) -> bool {
        self.clean.is_empty()
    }
}

/// A block recognised at some line, with the index of the first line after it.
struct Block {
    kind: SessionEventKind,
    content: String,
    next: usize,
}

impl SessionParser {
    pub fn new(markers: ParserMarkers) -> Self {
        Self { markers }
    }

    pub fn parse(&self, raw: &str) -> ParsedSession {
        let lines: Vec<ScanLine<'_>> = raw.lines().map(ScanLine::new).collect();
        let started_at = lines.first().and_then(|line| extract_start_time(&line.clean));

        let mut events = Vec::new();
        let mut recent = RecentContents::default();
        let mut index = 0usize;

        while index < lines.len() {
            let block = self
                .scan_user_input(&lines, index)
                .or_else(|| self.scan_response(&lines, index));

            let Some(block) = block else {
                index += 1;
                continue;
            };
            index = block.next.max(index + 1);

            if recent.seen_or_remember(&block.content) {
                continue;
            }
            events.push(
                SessionEvent::new(block.kind, block.content).with_timestamp(started_at.clone()),
            );
        }

        events.dedup_by(|next, prev| next.kind == prev.kind && next.content == prev.content);
        ParsedSession { started_at, events }
    }

    /// A submitted prompt: `> text` painted with the prompt background.
    pub fn is_user_input_line(&self, raw: &str, clean: &str) -> bool {
        PROMPT_LINE.is_match(clean) && self.has_user_background(raw)
    }

    /// Start of an agent response: a response-coloured bullet, or a bare
    /// bullet glyph in escape-free input. Feedback bullets never qualify.
    pub fn is_response_bullet(&self, raw: &str, clean: &str) -> bool {
        if contains_any(raw, &self.markers.feedback_bullets) {
            return false;
        }
        if contains_any(raw, &self.markers.response_bullets) {
            return true;
        }
        !has_escapes(raw) && clean.starts_with(BULLET_GLYPHS)
    }

    /// Body line of a response: indented at least two columns and starting
    /// with text, a dash or a bullet.
    pub fn is_continuation_line(&self, indented: &str) -> bool {
        let body = indented.trim_start();
        let indent = indented.len() - body.len();
        if indent < 2 {
            return false;
        }
        body.chars()
            .next()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '-' || BULLET_GLYPHS.contains(&ch))
    }

    pub fn is_status_line(&self, clean: &str) -> bool {
        let lower = clean.to_lowercase();
        self.markers
            .status_markers
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
    }

    fn has_user_background(&self, raw: &str) -> bool {
        contains_any(raw, &self.markers.user_background)
    }

    fn scan_user_input(&self, lines: &[ScanLine<'_>], start: usize) -> Option<Block> {
        let first = &lines[start];
        if !self.is_user_input_line(first.raw, &first.clean) {
            return None;
        }

        let mut collected = vec![first.clean.trim_start_matches('>').trim().to_string()];
        let mut blank_run = 0usize;
        let mut index = start + 1;

        while let Some(line) = lines.get(index) {
            if self.is_status_line(&line.clean) || self.is_user_input_line(line.raw, &line.clean) {
                break;
            }
            if line.is_blank() {
                blank_run += 1;
                if blank_run > MAX_BLANK_RUN {
                    break;
                }
                collected.push(String::new());
            } else if self.has_user_background(line.raw) {
                blank_run = 0;
                collected.push(line.clean.clone());
            } else {
                break;
            }
            index += 1;
        }

        let content = collected.join("\n").trim().to_string();
        // The minimum counts the prompt line as drawn, `> ` included.
        let drawn_len = first.clean.chars().count() + content.chars().count()
            - collected[0].chars().count();
        if PLACEHOLDER.is_match(&content) || drawn_len < MIN_USER_INPUT_CHARS {
            return None;
        }
        Some(Block {
            kind: SessionEventKind::UserInput,
            content,
            next: index,
        })
    }

    fn scan_response(&self, lines: &[ScanLine<'_>], start: usize) -> Option<Block> {
        let first = &lines[start];
        if !self.is_response_bullet(first.raw, &first.clean) {
            return None;
        }

        let mut collected = vec![first.clean.trim_start_matches(BULLET_GLYPHS).trim().to_string()];
        let mut blank_run = 0usize;
        let mut index = start + 1;

        while let Some(line) = lines.get(index) {
            if line.clean.starts_with('>') || is_frame_boundary(line) {
                break;
            }
            if line.is_blank() {
                blank_run += 1;
                if blank_run > MAX_BLANK_RUN {
                    break;
                }
                collected.push(String::new());
            } else if self.is_continuation_line(&line.indented) {
                blank_run = 0;
                collected.push(line.indented.trim().to_string());
            } else {
                break;
            }
            index += 1;
        }

        let content = collected.join("\n").trim().to_string();
        if content.chars().count() < MIN_RESPONSE_CHARS {
            return None;
        }
        Some(Block {
            kind: SessionEventKind::AgentResponse,
            content,
            next: index,
        })
    }
}

/// Convenience wrapper using the default markers.
pub fn parse_session_output(raw: &str) -> ParsedSession {
    SessionParser::default().parse(raw)
}

pub fn extract_start_time(first_clean_line: &str) -> Option<String> {
    SCRIPT_HEADER
        .captures(first_clean_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Content with bullet glyphs removed and whitespace collapsed, used to spot
/// redraws of the same frame.
pub fn normalize_content(content: &str) -> String {
    content
        .chars()
        .filter(|ch| !BULLET_GLYPHS.contains(ch))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_frame_boundary(line: &ScanLine<'_>) -> bool {
    FRAME_CONTROL.is_match(line.raw) || line.clean.starts_with(FRAME_GLYPHS)
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| !needle.is_empty() && haystack.contains(needle.as_str()))
}

/// Last few distinct normalized contents.
#[derive(Default)]
struct RecentContents {
    window: VecDeque<String>,
}

impl RecentContents {
    /// Returns true if `content` was already seen; otherwise remembers it.
    fn seen_or_remember(&mut self, content: &str) -> bool {
        let normalized = normalize_content(content);
        if self.window.contains(&normalized) {
            return true;
        }
        if self.window.len() == RECENT_CONTENT_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(normalized);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: &str = "\x1b[48;2;55;55;55m";
    const WHITE: &str = "\x1b[38;2;255;255;255m⏺\x1b[39m";
    const CYAN: &str = "\x1b[38;2;0;215;215m⏺\x1b[39m";
    const RESET: &str = "\x1b[0m";

    fn user(text: &str) -> String {
        format!("{BG}> {text}{RESET}")
    }

    fn response(text: &str) -> String {
        format!("{WHITE} {text}")
    }

    fn kinds_and_contents(parsed: &ParsedSession) -> Vec<(SessionEventKind, String)> {
        parsed
            .events
            .iter()
            .map(|event| (event.kind, event.content.clone()))
            .collect()
    }

    #[test]
    fn empty_input_produces_no_events() {
        let parsed = parse_session_output("");
        assert!(parsed.events.is_empty());
        assert_eq!(parsed.started_at, None);
    }

    #[test]
    fn user_input_then_response_yields_two_events_in_order() {
        let raw = [
            user("hello there"),
            String::new(),
            response("Hi! I read the plan and will start now."),
        ]
        .join("\n");

        let parsed = parse_session_output(&raw);
        assert_eq!(
            kinds_and_contents(&parsed),
            vec![
                (SessionEventKind::UserInput, "hello there".to_string()),
                (
                    SessionEventKind::AgentResponse,
                    "Hi! I read the plan and will start now.".to_string()
                ),
            ]
        );
    }

    #[test]
    fn short_prompt_with_marker_yields_user_input() {
        let raw = format!("{BG}> hello{RESET}\n{}", response("Hello! What should we build?"));
        let parsed = parse_session_output(&raw);
        assert_eq!(
            kinds_and_contents(&parsed),
            vec![
                (SessionEventKind::UserInput, "hello".to_string()),
                (
                    SessionEventKind::AgentResponse,
                    "Hello! What should we build?".to_string()
                ),
            ]
        );
    }

    #[test]
    fn prompt_without_background_is_not_user_input() {
        let raw = "> typing in progress\n";
        assert!(parse_session_output(raw).events.is_empty());
    }

    #[test]
    fn multi_line_user_input_collects_background_lines() {
        let raw = [
            user("first line of request"),
            format!("{BG}  second line{RESET}"),
            String::new(),
            format!("{BG}  third line{RESET}"),
            "✻ Thinking… (3s · esc to interrupt)".to_string(),
            format!("{BG}  not part of it{RESET}"),
        ]
        .join("\n");

        let parsed = parse_session_output(&raw);
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(
            parsed.events[0].content,
            "first line of request\nsecond line\n\nthird line"
        );
    }

    #[test]
    fn placeholder_and_short_inputs_are_rejected() {
        let raw = [user("Try \"fix the lint errors\""), user("ok")].join("\n");
        assert!(parse_session_output(&raw).events.is_empty());
    }

    #[test]
    fn response_collects_indented_continuations() {
        let raw = [
            response("I updated the parser:"),
            "  - stripped escapes".to_string(),
            "  - added tests".to_string(),
            "not indented, ends block".to_string(),
        ]
        .join("\n");

        let parsed = parse_session_output(&raw);
        assert_eq!(
            kinds_and_contents(&parsed),
            vec![(
                SessionEventKind::AgentResponse,
                "I updated the parser:\n- stripped escapes\n- added tests".to_string()
            )]
        );
    }

    #[test]
    fn response_stops_at_prompt_frame_or_blank_run() {
        let raw = [
            response("First answer with detail"),
            "  more detail here".to_string(),
            "> next prompt".to_string(),
            "  orphan continuation".to_string(),
            response("Second answer with detail"),
            String::new(),
            String::new(),
            String::new(),
            "  too far away".to_string(),
            response("Third answer with detail"),
            "\x1b[2K  redrawn line".to_string(),
        ]
        .join("\n");

        let parsed = parse_session_output(&raw);
        let contents: Vec<String> = parsed.events.into_iter().map(|e| e.content).collect();
        assert_eq!(
            contents,
            vec![
                "First answer with detail\nmore detail here".to_string(),
                "Second answer with detail".to_string(),
                "Third answer with detail".to_string(),
            ]
        );
    }

    #[test]
    fn cyan_bullet_is_never_a_response() {
        let raw = format!("{CYAN} How is Claude doing this session? (optional)");
        let parser = SessionParser::default();
        assert!(!parser.is_response_bullet(&raw, &strip_ansi(&raw)));
        assert!(parse_session_output(&raw).events.is_empty());
    }

    #[test]
    fn bare_bullet_counts_only_without_escapes() {
        let parser = SessionParser::default();
        assert!(parser.is_response_bullet("⏺ plain fixture", "⏺ plain fixture"));
        let dimmed = "\x1b[2m⏺ dimmed tool call";
        assert!(!parser.is_response_bullet(dimmed, &strip_ansi(dimmed)));
    }

    #[test]
    fn short_responses_are_rejected() {
        assert!(parse_session_output("⏺ Done.").events.is_empty());
        assert_eq!(parse_session_output("⏺ All done now").events.len(), 1);
    }

    #[test]
    fn redrawn_frames_collapse_to_one_event() {
        let raw = [
            response("Reading plan.md now"),
            "● Reading plan.md now".to_string(),
            response("Reading plan.md now"),
        ]
        .join("\n");

        let parsed = parse_session_output(&raw);
        assert_eq!(parsed.events.len(), 1);
    }

    #[test]
    fn repeat_outside_recent_window_is_emitted_again() {
        let mut lines = vec![response("Recurring status update")];
        for n in 0..RECENT_CONTENT_WINDOW {
            lines.push(response(&format!("Distinct response number {n}")));
        }
        lines.push(response("Recurring status update"));

        let parsed = parse_session_output(&lines.join("\n"));
        assert_eq!(parsed.events.len(), RECENT_CONTENT_WINDOW + 2);
        assert_eq!(
            parsed.events.last().unwrap().content,
            "Recurring status update"
        );
    }

    #[test]
    fn script_header_sets_start_time_on_events() {
        let raw = [
            "Script started on 2026-03-01 10:15:00+00:00 [COMMAND=\"claude\" TERM=\"xterm\"]"
                .to_string(),
            response("Starting on the implementation"),
        ]
        .join("\n");

        let parsed = parse_session_output(&raw);
        assert_eq!(
            parsed.started_at.as_deref(),
            Some("2026-03-01 10:15:00+00:00")
        );
        assert_eq!(
            parsed.events[0].timestamp.as_deref(),
            Some("2026-03-01 10:15:00+00:00")
        );
    }

    #[test]
    fn custom_markers_retarget_the_heuristics() {
        let markers = ParserMarkers {
            response_bullets: vec!["\x1b[35m⏺".to_string()],
            ..ParserMarkers::default()
        };
        let parser = SessionParser::new(markers);
        let raw = "\x1b[35m⏺\x1b[0m Magenta themed response";

        assert_eq!(parser.parse(raw).events.len(), 1);
        assert!(parse_session_output(raw).events.is_empty());
    }

    #[test]
    fn garbage_input_never_panics() {
        let raw = "\x1b[\x1b]\x07\u{0}>\n⏺\n  \n\x1b[?1049h>  \n│ > │";
        let _ = parse_session_output(raw);
    }

    #[test]
    fn normalize_strips_bullets_and_whitespace() {
        assert_eq!(normalize_content("⏺  Reading   file"), "Reading file");
        assert_eq!(normalize_content("• a\n  b"), "a b");
    }
}
