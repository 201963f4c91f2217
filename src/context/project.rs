use super::{now_epoch, scope_name};
use crate::cache::{CONTEXT_TTL, TtlCache, keys};
use crate::config::Config;
use crate::git::GitProbe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project_name: String,
    pub project_root: PathBuf,
    #[serde(default)]
    pub git_repo_name: Option<String>,
    pub last_updated: f64,
}

/// Resolve the project for an invocation running in `cwd`.
///
/// With a declared project name, a cached snapshot is returned as-is (it may
/// be up to [`CONTEXT_TTL`] old). Otherwise the context is rebuilt: the
/// declared name or the directory name, the configured project root, and
/// the repository name from config or from the `origin` remote. The result
/// is written back to the cache.
pub fn resolve(
    cwd: &Path,
    config: &Config,
    cache: &mut TtlCache,
    git: &dyn GitProbe,
) -> ProjectContext {
    if let Some(name) = config.project_name.as_deref() {
        if let Some(cached) = cache.get::<ProjectContext>(&keys::project_context(name)) {
            debug!(project = name, "project context from cache");
            return cached;
        }
    }

    let project_name = scope_name(config.project_name.as_deref(), cwd);
    let git_repo_name = config.git_repo_name.clone().or_else(|| {
        git.try_origin_url(cwd)
            .and_then(|url| repo_name_from_url(&url))
    });
    let context = ProjectContext {
        project_root: config
            .project_dir
            .clone()
            .unwrap_or_else(|| cwd.to_path_buf()),
        project_name,
        git_repo_name,
        last_updated: now_epoch(),
    };

    if !context.project_name.is_empty() {
        cache.set(
            &keys::project_context(&context.project_name),
            &context,
            CONTEXT_TTL,
        );
    }
    context
}

/// `git@host:user/repo.git` and `https://host/user/repo.git` both give `repo`.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let last = url.trim().rsplit('/').next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then(|| name.to_string())
}
