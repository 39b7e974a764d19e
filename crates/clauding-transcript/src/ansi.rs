//! ANSI escape removal for terminal captures.

use regex::Regex;
use std::sync::LazyLock;

static ESCAPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        // OSC: ESC ] ... BEL | ESC \
        r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        // CSI, including private modes like ESC[?25h
        r"|\x1b\[[0-?]*[ -/]*[@-~]",
        // charset selection
        r"|\x1b[()][0-9A-Za-z]",
        // remaining two-byte escapes
        r"|\x1b[@-Z\\-_=>78]",
        // private mode toggles whose ESC was lost in capture
        r"|\[\?[0-9;]+[hl]",
    ))
    .expect("escape pattern is valid")
});

static CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0b-\x1f\x7f]").expect("control pattern is valid"));

/// Strip escapes and control characters, keeping leading indentation.
pub fn strip_ansi_keep_indent(line: &str) -> String {
    let without_escapes = ESCAPES.replace_all(line, "");
    let cleaned = CONTROL.replace_all(&without_escapes, "");
    cleaned.trim_end().to_string()
}

/// Strip escapes and control characters and trim both ends.
pub fn strip_ansi(line: &str) -> String {
    strip_ansi_keep_indent(line).trim_start().to_string()
}

/// True when `line` carries any escape sequence.
pub fn has_escapes(line: &str) -> bool {
    line.contains('\x1b')
}
