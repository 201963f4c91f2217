use super::{GitContext, RECENT_COMMITS};
use crate::context::now_epoch;
use git2::{Repository, Sort, Status, StatusOptions};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Read-only access to version control, bounded in time. Every lookup
/// either answers within its budget or reports `None`.
pub trait GitProbe {
    /// URL of the `origin` remote of the repository containing `dir`.
    fn try_origin_url(&self, dir: &Path) -> Option<String>;

    /// Current branch, working-tree status and recent history.
    fn try_snapshot(&self, dir: &Path) -> Option<GitContext>;
}

/// [`GitProbe`] backed by libgit2 on the local repository.
pub struct LocalGit {
    timeout: Duration,
}

impl LocalGit {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GitProbe for LocalGit {
    fn try_origin_url(&self, dir: &Path) -> Option<String> {
        let dir = dir.to_path_buf();
        bounded(self.timeout, "origin url", move || origin_url(&dir))
    }

    fn try_snapshot(&self, dir: &Path) -> Option<GitContext> {
        let dir = dir.to_path_buf();
        bounded(self.timeout, "snapshot", move || snapshot(&dir))
    }
}

/// Run `lookup` on a worker and wait at most `timeout` for its answer.
/// A late answer is dropped along with the worker.
fn bounded<T, F>(timeout: Duration, what: &str, lookup: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, git2::Error> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(lookup());
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            debug!("git {what} unavailable: {}", err.message());
            None
        }
        Err(_) => {
            debug!("git {what} timed out after {timeout:?}");
            None
        }
    }
}

fn origin_url(dir: &Path) -> Result<String, git2::Error> {
    let repo = Repository::discover(dir)?;
    let remote = repo.find_remote("origin")?;
    remote
        .url()
        .map(str::to_string)
        .ok_or_else(|| git2::Error::from_str("origin url is not valid utf-8"))
}

fn snapshot(dir: &Path) -> Result<GitContext, git2::Error> {
    let repo = Repository::discover(dir)?;
    let modified_files = status_lines(&repo)?;
    Ok(GitContext {
        branch: current_branch(&repo),
        modified_files_count: modified_files.len(),
        modified_files,
        recent_commits: recent_commits(&repo, RECENT_COMMITS),
        last_updated: now_epoch(),
    })
}

/// Checked-out branch name; `None` when HEAD is detached. An unborn
/// branch (no commits yet) still reports the name HEAD points at.
fn current_branch(repo: &Repository) -> Option<String> {
    match repo.head() {
        Ok(head) if head.is_branch() => head.shorthand().map(str::to_string),
        Ok(_) => None,
        Err(_) => {
            let head = repo.find_reference("HEAD").ok()?;
            head.symbolic_target()?
                .strip_prefix("refs/heads/")
                .map(str::to_string)
        }
    }
}

/// One trimmed porcelain-style line per changed path, e.g. `M src/lib.rs`
/// or `?? notes.txt`.
fn status_lines(repo: &Repository) -> Result<Vec<String>, git2::Error> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .include_ignored(false)
        .recurse_untracked_dirs(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .filter_map(|entry| {
            let code = porcelain_code(entry.status())?;
            let path = entry.path()?;
            Some(format!("{code} {path}").trim().to_string())
        })
        .collect())
}

fn porcelain_code(status: Status) -> Option<String> {
    if status.is_ignored() || status == Status::CURRENT {
        return None;
    }
    if status.is_conflicted() {
        return Some("UU".into());
    }
    if status.is_wt_new() && !status.intersects(index_flags()) {
        return Some("??".into());
    }
    let index = if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else if status.is_index_typechange() {
        'T'
    } else {
        ' '
    };
    let worktree = if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else if status.is_wt_typechange() {
        'T'
    } else {
        ' '
    };
    Some(format!("{index}{worktree}"))
}

fn index_flags() -> Status {
    Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
}

/// Up to `limit` commits reachable from HEAD, newest first. Empty when the
/// branch has no commits.
fn recent_commits(repo: &Repository, limit: usize) -> Vec<String> {
    let Ok(mut walk) = repo.revwalk() else {
        return Vec::new();
    };
    if walk.push_head().is_err() || walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME).is_err() {
        return Vec::new();
    }
    walk.filter_map(Result::ok)
        .take(limit)
        .filter_map(|oid| {
            let commit = repo.find_commit(oid).ok()?;
            let short = commit.as_object().short_id().ok()?;
            let short = short.as_str()?.to_string();
            Some(format!("{short} {}", commit.summary().unwrap_or_default()))
        })
        .collect()
}
