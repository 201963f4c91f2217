use crate::cache::DEFAULT_CACHE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const SETTINGS_FILE: &str = "worktree-hooks.toml";

const DEFAULT_ALLOWED_RM_DIRECTORIES: &[&str] = &["trees/", "worktrees/"];

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Optional template overrides for one message call site. Each field is a
/// minijinja template; unset fields use the built-in wording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSettings {
    #[serde(default)]
    pub notification: TemplateOverrides,
    #[serde(default)]
    pub completion: TemplateOverrides,
    #[serde(default)]
    pub subagent: TemplateOverrides,
}

/// File-based settings from `.claude/worktree-hooks.toml`.
///
/// ```toml
/// allowed_rm_directories = ["trees/", "worktrees/"]
/// announce_commands = [["say"], ["espeak", "-s", "160"]]
/// completion_commands = [["llm", "-s", "One short upbeat sentence saying the work is done."]]
/// provider_timeout_secs = 10
///
/// [messages.notification]
/// agent_task = "{{ lead }} {{ agent_name }} is stuck on {{ task_slug }}"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Relative path prefixes where recursive deletes are permitted.
    #[serde(default = "default_allowed_rm_directories")]
    pub allowed_rm_directories: Vec<String>,

    /// Speech providers in priority order; each entry is an argv to which
    /// the message is appended.
    #[serde(default)]
    pub announce_commands: Vec<Vec<String>>,

    /// Programs that write a completion sentence to stdout, tried in order
    /// when a finished agent has no context to report.
    #[serde(default)]
    pub completion_commands: Vec<Vec<String>>,

    /// Limit for each announce or completion command.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    #[serde(default)]
    pub messages: MessageSettings,
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

fn default_allowed_rm_directories() -> Vec<String> {
    DEFAULT_ALLOWED_RM_DIRECTORIES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allowed_rm_directories: default_allowed_rm_directories(),
            announce_commands: Vec::new(),
            completion_commands: Vec::new(),
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            messages: MessageSettings::default(),
        }
    }
}

impl Settings {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn default_path(project_root: &Path) -> PathBuf {
        project_root.join(".claude").join(SETTINGS_FILE)
    }

    /// Load settings from `path`. A missing file yields the defaults;
    /// missing keys are filled in by serde.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Like [`Settings::load`], but a broken file is logged and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            warn!("{err:#}; using default settings");
            Settings::default()
        })
    }
}

/// Explicit worktree identity, outranking anything inferred from the path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorktreeOverrides {
    pub worktree_name: Option<String>,
    pub agent_color: Option<String>,
    pub agent_name: Option<String>,
}

/// Everything a hook invocation reads from its environment, gathered once
/// and passed by reference to the resolvers, the gate and the composer.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub project_name: Option<String>,
    pub project_dir: Option<PathBuf>,
    pub git_repo_name: Option<String>,
    pub worktree: WorktreeOverrides,
    pub engineer_name: Option<String>,
    pub cache_url: String,
    pub settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: None,
            project_dir: None,
            git_repo_name: None,
            worktree: WorktreeOverrides::default(),
            engineer_name: None,
            cache_url: DEFAULT_CACHE_URL.to_string(),
            settings: Settings::default(),
        }
    }
}

impl Config {
    /// Build from the process environment, loading settings from
    /// `settings_path` or from `<project root>/.claude/worktree-hooks.toml`.
    pub fn from_env(cwd: &Path, settings_path: Option<&Path>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cwd, settings_path)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cwd: &Path,
        settings_path: Option<&Path>,
    ) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let project_dir = var("CLAUDE_PROJECT_DIR").map(PathBuf::from);
        let settings_path = match settings_path {
            Some(path) => path.to_path_buf(),
            None => Settings::default_path(project_dir.as_deref().unwrap_or(cwd)),
        };
        Self {
            project_name: var("PROJECT_NAME"),
            project_dir,
            git_repo_name: var("GIT_REPO_NAME"),
            worktree: WorktreeOverrides {
                worktree_name: var("WORKTREE_NAME"),
                agent_color: var("AGENT_COLOR"),
                agent_name: var("AGENT_NAME"),
            },
            engineer_name: var("ENGINEER_NAME"),
            cache_url: var("REDIS_URL").unwrap_or_else(|| DEFAULT_CACHE_URL.to_string()),
            settings: Settings::load_or_default(&settings_path),
        }
    }
}
