//! Configuration loaded from `clauding.toml`.
//!
//! The resolved value is handed to the orchestrator at construction time and
//! never re-read behind its back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "clauding.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config at {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to create config parent directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClaudingConfig {
    pub agent: AgentConfig,
    /// System prompt prepended to every templated prompt, keyed by agent id.
    pub agent_prompts: BTreeMap<String, String>,
    pub terminal: TerminalConfig,
    pub stability: StabilityConfig,
    pub parser: ParserConfig,
}

/// Default agent invocation; a per-call override can replace any field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub id: String,
    pub executable: String,
    pub flags: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: "claude".to_string(),
            executable: "claude".to_string(),
            flags: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Prefix of every terminal name: `{product_prefix}: {feature}-{command}`.
    pub product_prefix: String,
    pub shell: String,
    pub rows: u16,
    pub cols: u16,
    /// Per-terminal in-memory scrollback; older output is dropped.
    pub scrollback_limit_bytes: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            product_prefix: "Clauding".to_string(),
            shell: "bash".to_string(),
            rows: 40,
            cols: 120,
            scrollback_limit_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub max_wait_ms: u64,
    pub interval_ms: u64,
    pub required_stable_checks: u32,
    /// Grace period after the terminal closes before polling starts.
    pub settle_delay_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 2_000,
            interval_ms: 50,
            required_stable_checks: 3,
            settle_delay_ms: 200,
        }
    }
}

impl StabilityConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Write `.md`/`.json` projections after each run.
    pub enabled: bool,
    pub markers: ParserMarkers,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            markers: ParserMarkers::default(),
        }
    }
}

/// Theme-dependent signals the scanner keys on.
///
/// Defaults match the agent's stock dark theme. The colour split between
/// response and feedback bullets is fragile across themes, so callers can
/// swap the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserMarkers {
    /// Background colour painted behind a submitted prompt.
    pub user_background: Vec<String>,
    /// Colour prefixes of bullets that start an agent response.
    pub response_bullets: Vec<String>,
    /// Colour prefixes of bullets belonging to the feedback prompt.
    pub feedback_bullets: Vec<String>,
    /// Clean-text fragments of the elapsed/thinking status line.
    pub status_markers: Vec<String>,
}

impl Default for ParserMarkers {
    fn default() -> Self {
        Self {
            user_background: vec![
                "\x1b[48;2;55;55;55m".to_string(),
                "\x1b[48;5;237m".to_string(),
            ],
            response_bullets: vec![
                "\x1b[38;2;255;255;255m⏺".to_string(),
                "\x1b[37m⏺".to_string(),
                "\x1b[97m⏺".to_string(),
            ],
            feedback_bullets: vec![
                "\x1b[38;2;0;215;215m⏺".to_string(),
                "\x1b[36m⏺".to_string(),
                "\x1b[96m⏺".to_string(),
            ],
            status_markers: vec!["esc to interrupt".to_string(), "elapsed".to_string()],
        }
    }
}

pub fn parse_config(contents: &str) -> Result<ClaudingConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<ClaudingConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_config(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<ClaudingConfig, ConfigError> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Ok(ClaudingConfig::default());
    }
    load_config(path_ref)
}

pub fn save_config(path: impl AsRef<Path>, config: &ClaudingConfig) -> Result<(), ConfigError> {
    let path_ref = path.as_ref();
    if let Some(parent_dir) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent_dir).map_err(|source| ConfigError::CreateDir {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let body = toml::to_string_pretty(config).map_err(|source| ConfigError::Serialize {
        path: path_ref.to_path_buf(),
        source,
    })?;
    fs::write(path_ref, body).map_err(|source| ConfigError::Write {
        path: path_ref.to_path_buf(),
        source,
    })?;
    Ok(())
}
