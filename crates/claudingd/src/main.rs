use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clauding_agents::pty::{PtyTerminalHost, RunnerPtySize};
use clauding_agents::status_store::StatusStore;
use clauding_agents::types::AgentOverride;
use clauding_core::config::{load_config, load_config_or_default, ClaudingConfig, DEFAULT_CONFIG_FILE};
use clauding_core::status::StatusEventType;
use clauding_core::types::FeatureLayout;
use clauding_core::validation::{Validate, ValidationLevel};
use clauding_git::command::GitCli;
use clauding_git::repo::current_branch;
use clauding_transcript::parse::SessionParser;
use clauding_transcript::render::write_projections;
use claudingd::{handle_hook, AgentOrchestrator, ConflictContext, ExecuteRequest, SessionEnv, COMMANDS};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clauding")]
#[command(about = "Run coding-agent sessions for feature worktrees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a registered command in a pty and wait for it to finish
    Run(RunArgs),
    /// Parse a transcript and write its .md/.json projections
    Parse {
        transcript: PathBuf,
        /// Read `[parser.markers]` from this file instead of `./clauding.toml`
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Record a lifecycle event from the agent's hook configuration
    Hook {
        /// Event type; read from the stdin payload when omitted
        event: Option<StatusEventType>,
    },
    /// List status records in an outputs directory, newest first
    Status {
        outputs_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List registered commands
    Commands,
}

#[derive(Args)]
struct RunArgs {
    /// Command name or id, e.g. "Implement Plan"
    command: String,
    #[arg(long, default_value = ".")]
    worktree: PathBuf,
    #[arg(long)]
    feature: Option<String>,
    /// Defaults to `<worktree>/clauding.toml` when present
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    agent_id: Option<String>,
    #[arg(long)]
    executable: Option<String>,
    /// Pass an empty string to run without flags
    #[arg(long, allow_hyphen_values = true)]
    flags: Option<String>,
    /// Branch being merged in, for conflict resolution
    #[arg(long)]
    source_branch: Option<String>,
    /// Defaults to the worktree's current branch
    #[arg(long)]
    target_branch: Option<String>,
    #[arg(long = "conflicted-file")]
    conflicted_files: Vec<String>,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("clauding: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let level = std::env::var("CLAUDING_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(args),
        Commands::Parse { transcript, config } => run_parse(&transcript, config.as_deref()),
        Commands::Hook { event } => run_hook(event),
        Commands::Status { outputs_dir, json } => run_status(&outputs_dir, json),
        Commands::Commands => {
            for spec in COMMANDS {
                println!("{:<20} {:<18} {}", spec.name, spec.id, spec.class.as_str());
            }
            Ok(())
        }
    }
}

fn run_command(args: RunArgs) -> Result<()> {
    let worktree = args
        .worktree
        .canonicalize()
        .with_context(|| format!("worktree {} not found", args.worktree.display()))?;
    let config = resolve_config(args.config.as_deref(), &worktree)?;

    let conflict = match args.source_branch {
        Some(source_branch) => {
            let target_branch = match args.target_branch {
                Some(branch) => branch,
                None => current_branch(&worktree, &GitCli::default())
                    .context("cannot determine target branch; pass --target-branch")?,
            };
            Some(ConflictContext {
                source_branch,
                target_branch,
                conflicted_files: args.conflicted_files,
            })
        }
        None => None,
    };
    let agent_override = (args.agent_id.is_some() || args.executable.is_some() || args.flags.is_some())
        .then(|| AgentOverride {
            id: args.agent_id,
            executable: args.executable,
            flags: args.flags,
        });

    let host = Arc::new(
        PtyTerminalHost::new(RunnerPtySize {
            rows: config.terminal.rows,
            cols: config.terminal.cols,
        })
        .with_scrollback_limit(config.terminal.scrollback_limit_bytes),
    );
    let orchestrator = AgentOrchestrator::new(config, host);
    let result = orchestrator.execute(ExecuteRequest {
        command: args.command,
        worktree,
        feature_name: args.feature,
        conflict,
        agent_override,
    })?;

    println!("{}", result.output_file.display());
    if let Some(code) = result.exit_code.filter(|code| *code != 0) {
        warn!(exit_code = code, "agent exited with a non-zero status");
    }
    Ok(())
}

fn resolve_config(explicit: Option<&Path>, worktree: &Path) -> Result<ClaudingConfig> {
    let config = match explicit {
        Some(path) => load_config(path)?,
        None => load_config_or_default(worktree.join(DEFAULT_CONFIG_FILE))?,
    };

    let mut fatal = false;
    for issue in config.validate() {
        match issue.level {
            ValidationLevel::Error => {
                fatal = true;
                eprintln!("config error [{}]: {}", issue.code, issue.message);
            }
            ValidationLevel::Warning => warn!(code = issue.code, "{}", issue.message),
        }
    }
    if fatal {
        bail!("configuration is invalid");
    }
    Ok(config)
}

fn run_parse(transcript: &Path, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => load_config_or_default(DEFAULT_CONFIG_FILE)?,
    };
    let parser = SessionParser::new(config.parser.markers);
    let written = write_projections(transcript, &parser)?;
    info!(events = written.event_count, "parsed transcript");
    println!("{}", written.markdown.display());
    println!("{}", written.json.display());
    Ok(())
}

fn run_hook(event: Option<StatusEventType>) -> Result<()> {
    let mut stdin = String::new();
    io::stdin()
        .read_to_string(&mut stdin)
        .context("failed to read hook payload")?;
    handle_hook(event, &stdin, SessionEnv::from_process_env(), hook_pid())?;
    Ok(())
}

/// The agent that ran the hook, not the short-lived hook process.
#[cfg(unix)]
fn hook_pid() -> u32 {
    std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn hook_pid() -> u32 {
    std::process::id()
}

fn run_status(outputs_dir: &Path, json: bool) -> Result<()> {
    let dir = if outputs_dir.join(".clauding").is_dir() {
        FeatureLayout::for_worktree(outputs_dir).outputs_dir
    } else {
        outputs_dir.to_path_buf()
    };
    let records = StatusStore::new(dir).list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no sessions");
        return Ok(());
    }
    for record in records {
        let mut line = format!(
            "{}  {:<14} {:<40} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.event_type.as_str(),
            record.session_id.as_ref(),
            record.feature_name,
        );
        if let Some(state) = record.state {
            line.push_str(&format!("  state={state}"));
        }
        if let Some(tool) = &record.current_tool {
            line.push_str(&format!("  tool={tool}"));
        }
        if let Some(error) = &record.error {
            line.push_str(&format!("  error={error}"));
        }
        println!("{line}");
    }
    Ok(())
}
