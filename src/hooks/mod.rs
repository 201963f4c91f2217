//! Hook event handlers. The safety gate runs before anything else and is
//! the only loud outcome; every other path fails open.

use crate::announce::{self, Announcer, PhraseGenerator};
use crate::branch::{self, FeatureBranchMetadata};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::context::{self, ProjectContext, WorktreeContext};
use crate::gate;
use crate::git::{self, GitProbe};
use crate::message::{MessageComposer, MessageContext, MessageKind};
use crate::types::{HookInput, HookOutput, PreToolUseInput, ToolCall};
use rand::Rng;
use std::path::Path;
use tracing::{debug, info, warn};

/// Notification text Claude sends when it is merely idle. Not worth
/// announcing.
pub const WAITING_FOR_INPUT: &str = "Claude is waiting for your input";

/// How a hook invocation ends.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Exit 0, optionally printing JSON to stdout.
    Pass(Option<HookOutput>),
    /// Exit 2 with the reason on stderr.
    Block(String),
}

/// Run the command safety gate against the configured allow-list.
pub fn check_command(command: &str, config: &Config) -> Outcome {
    let allowed = &config.settings.allowed_rm_directories;
    if gate::classify(command, allowed) {
        info!(command, "blocked dangerous rm command");
        Outcome::Block(gate::block_reason(allowed))
    } else {
        Outcome::Pass(None)
    }
}

pub fn handle_pre_tool_use(input: &PreToolUseInput, config: &Config) -> Outcome {
    match input.tool_call() {
        Ok(ToolCall::Bash(bash)) => check_command(&bash.command, config),
        Ok(ToolCall::Other) => Outcome::Pass(None),
        Err(err) => {
            warn!("unreadable Bash tool input: {err}");
            Outcome::Pass(None)
        }
    }
}

/// Which message an event should speak, if any. Nothing is announced
/// without `--notify`, and idle notifications are skipped.
pub fn announcement_kind(input: &HookInput, notify: bool) -> Option<MessageKind> {
    if !notify {
        return None;
    }
    match input {
        HookInput::Notification(e) if e.message == WAITING_FOR_INPUT => {
            debug!("skipping idle notification");
            None
        }
        HookInput::Notification(_) => Some(MessageKind::Notification),
        HookInput::Stop(_) => Some(MessageKind::Completion),
        HookInput::SubagentStop(_) => Some(MessageKind::Subagent),
        HookInput::PreToolUse(_) | HookInput::Other => None,
    }
}

/// Everything known about where a hook is running.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub worktree: WorktreeContext,
    pub project: ProjectContext,
    pub branch: FeatureBranchMetadata,
}

impl HookContext {
    /// Worktree, then project, then the cached git snapshot and whatever its
    /// branch name encodes. Git data is only looked up when the cache is
    /// reachable; it is never computed here.
    pub fn resolve(cwd: &Path, config: &Config, cache: &mut TtlCache, probe: &dyn GitProbe) -> Self {
        let worktree = context::worktree::resolve(cwd, config, cache);
        let project = context::project::resolve(cwd, config, cache, probe);

        let git = if cache.is_available() {
            git::read(
                &project.project_name,
                worktree.worktree_name.as_deref(),
                cache,
            )
        } else {
            None
        };
        let branch = git
            .as_ref()
            .and_then(|g| g.branch.as_deref())
            .map(branch::parse)
            .unwrap_or_default();

        debug!(
            project = %project.project_name,
            agent = ?worktree.agent_name,
            task = ?branch.task_slug,
            "resolved hook context"
        );
        Self {
            worktree,
            project,
            branch,
        }
    }

    pub fn message_context(&self) -> MessageContext<'_> {
        MessageContext {
            agent_name: self.worktree.agent_name.as_deref(),
            project_name: Some(self.project.project_name.as_str()),
            task_slug: self.branch.task_slug.as_deref(),
        }
    }
}

/// Composes and delivers spoken status messages.
pub struct Speaker<'a> {
    config: &'a Config,
    probe: &'a dyn GitProbe,
    announcers: &'a [Box<dyn Announcer>],
    generators: &'a [Box<dyn PhraseGenerator>],
}

impl<'a> Speaker<'a> {
    pub fn new(
        config: &'a Config,
        probe: &'a dyn GitProbe,
        announcers: &'a [Box<dyn Announcer>],
    ) -> Self {
        Self {
            config,
            probe,
            announcers,
            generators: &[],
        }
    }

    /// Completion phrase generators for agents with no context.
    pub fn with_generators(mut self, generators: &'a [Box<dyn PhraseGenerator>]) -> Self {
        self.generators = generators;
        self
    }

    pub fn compose<R: Rng>(
        &self,
        kind: MessageKind,
        cwd: &Path,
        cache: &mut TtlCache,
        rng: &mut R,
    ) -> String {
        let context = HookContext::resolve(cwd, self.config, cache, self.probe);
        MessageComposer::new(self.config)
            .with_generators(self.generators)
            .compose(kind, &context.message_context(), rng)
    }

    /// Compose the message and announce it. When no announcer speaks it, the
    /// message is handed back as a `systemMessage` instead.
    pub fn speak<R: Rng>(
        &self,
        kind: MessageKind,
        cwd: &Path,
        cache: &mut TtlCache,
        rng: &mut R,
    ) -> Option<HookOutput> {
        let message = self.compose(kind, cwd, cache, rng);
        match announce::announce(self.announcers, &message) {
            Some(provider) => {
                debug!(provider, "announced: {message}");
                None
            }
            None => Some(HookOutput::system_message(message)),
        }
    }
}

/// Snapshot the repository at `cwd` into the cache for the hooks to read.
/// Returns whether anything was written. Never fails: an unreachable cache
/// or a path outside a repository just skips the update.
pub fn update_git_cache(
    cwd: &Path,
    config: &Config,
    cache: &mut TtlCache,
    probe: &dyn GitProbe,
) -> bool {
    if !cache.is_available() {
        info!("cache unavailable, skipping git cache update");
        return false;
    }

    let worktree = context::worktree::resolve(cwd, config, cache);
    let project = context::project::resolve(cwd, config, cache, probe);
    let Some(snapshot) = probe.try_snapshot(cwd) else {
        warn!(cwd = %cwd.display(), "no git snapshot, skipping cache update");
        return false;
    };

    let written = git::write(
        &project.project_name,
        worktree.worktree_name.as_deref(),
        &snapshot,
        cache,
    );
    if written {
        info!(
            project = %project.project_name,
            color = ?worktree.agent_color,
            branch = ?snapshot.branch,
            "updated git cache"
        );
    } else {
        warn!(project = %project.project_name, "failed to update git cache");
    }
    written
}
