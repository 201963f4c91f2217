use crate::cache::{self, TtlCache, keys};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod probe;

pub use probe::{GitProbe, LocalGit};

/// Branch and working-tree state for one checkout, written by the git
/// hooks and only ever read by the hook handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitContext {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub modified_files: Vec<String>,
    #[serde(default)]
    pub modified_files_count: usize,
    /// Newest first, `<short-id> <summary>`, at most [`RECENT_COMMITS`].
    #[serde(default)]
    pub recent_commits: Vec<String>,
    #[serde(default)]
    pub last_updated: f64,
}

pub const RECENT_COMMITS: usize = 5;

/// Budget for any single repository lookup made from a hook.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Look up the cached git snapshot for a project (and worktree). Absence or
/// expiry is reported as `None`; nothing is recomputed here.
pub fn read(project: &str, worktree: Option<&str>, cache: &mut TtlCache) -> Option<GitContext> {
    cache.get(&keys::git_context(project, worktree))
}

/// Store a freshly computed snapshot under the same key scheme [`read`]
/// uses, with the short git TTL.
pub fn write(
    project: &str,
    worktree: Option<&str>,
    context: &GitContext,
    cache: &mut TtlCache,
) -> bool {
    cache.set(&keys::git_context(project, worktree), context, cache::GIT_TTL)
}
