mod announce;
mod branch;
mod cache;
mod config;
mod context;
mod gate;
mod git;
mod hooks;
mod message;
mod types;

use anyhow::{Context, Result};
use cache::TtlCache;
use clap::{Parser, Subcommand};
use config::Config;
use git::{GIT_TIMEOUT, LocalGit};
use hooks::{Outcome, Speaker};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use types::{CommonInput, HookInput};

/// Claude Code hooks for color-coded agent worktrees.
#[derive(Parser)]
#[command(name = "worktree-hooks", version, about)]
struct Cli {
    /// Settings file (defaults to <project>/.claude/worktree-hooks.toml)
    #[arg(long, global = true, env = "WORKTREE_HOOKS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "WORKTREE_HOOKS_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one hook event read from stdin
    Hook {
        /// Announce status messages instead of staying silent
        #[arg(long)]
        notify: bool,
    },
    /// Snapshot the repository into the cache (run from git hooks)
    UpdateGitCache {
        /// Repository directory (defaults to the current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
    /// Classify a shell command with the rm safety gate
    Check {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("reading hook input")?;
    Ok(buffer)
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// The agent's working directory from the payload, else our own.
fn hook_cwd(common: Option<&CommonInput>) -> PathBuf {
    match common {
        Some(c) if !c.cwd.is_empty() => PathBuf::from(&c.cwd),
        _ => current_dir(),
    }
}

fn run_hook(notify: bool, settings_path: Option<&Path>) -> Result<Outcome> {
    let raw = read_stdin()?;
    let input: HookInput = match serde_json::from_str(&raw) {
        Ok(input) => input,
        Err(err) => {
            warn!("ignoring unreadable hook input: {err}");
            return Ok(Outcome::Pass(None));
        }
    };

    let cwd = hook_cwd(input.common());
    let config = Config::from_env(&cwd, settings_path);

    // The gate answers before any cache or git work.
    if let HookInput::PreToolUse(e) = &input {
        return Ok(hooks::handle_pre_tool_use(e, &config));
    }

    let Some(kind) = hooks::announcement_kind(&input, notify) else {
        return Ok(Outcome::Pass(None));
    };
    let probe = LocalGit::new(GIT_TIMEOUT);
    let timeout = config.settings.provider_timeout();
    let announcers = announce::from_commands(&config.settings.announce_commands, timeout);
    let generators =
        announce::generators_from_commands(&config.settings.completion_commands, timeout);
    let mut cache = TtlCache::connect(&config.cache_url);
    let output = Speaker::new(&config, &probe, &announcers)
        .with_generators(&generators)
        .speak(kind, &cwd, &mut cache, &mut rand::rng());
    Ok(Outcome::Pass(output))
}

fn run_update_git_cache(cwd: Option<PathBuf>, settings_path: Option<&Path>) -> Result<Outcome> {
    let cwd = cwd.unwrap_or_else(current_dir);
    let config = Config::from_env(&cwd, settings_path);
    let mut cache = TtlCache::connect(&config.cache_url);
    hooks::update_git_cache(&cwd, &config, &mut cache, &LocalGit::new(GIT_TIMEOUT));
    Ok(Outcome::Pass(None))
}

fn run_check(command: &[String], settings_path: Option<&Path>) -> Result<Outcome> {
    let config = Config::from_env(&current_dir(), settings_path);
    Ok(hooks::check_command(&command.join(" "), &config))
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    let settings_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Hook { notify } => run_hook(notify, settings_path),
        Commands::UpdateGitCache { cwd } => run_update_git_cache(cwd, settings_path),
        Commands::Check { command } => run_check(&command, settings_path),
    };

    match result {
        Ok(Outcome::Pass(Some(output))) => match serde_json::to_string(&output) {
            Ok(json) => println!("{json}"),
            Err(err) => warn!("serializing hook output: {err}"),
        },
        Ok(Outcome::Pass(None)) => {}
        Ok(Outcome::Block(reason)) => {
            eprintln!("{reason}");
            process::exit(2);
        }
        // Fail open.
        Err(err) => warn!("worktree-hooks: {err:#}"),
    }
}
