//! Who is running this hook: the logical project and, inside a per-agent
//! checkout, the color-coded agent. Both resolvers consult the cache first
//! and never fail; whatever can't be determined stays `None`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod project;
pub mod worktree;

pub use project::ProjectContext;
pub use worktree::WorktreeContext;

/// Seconds since the Unix epoch, as stored in `last_updated` fields.
pub fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Final segment of `dir`, or an empty string for `/`.
pub fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Project name used to scope cache keys: the declared name, else the
/// directory name.
pub fn scope_name(declared: Option<&str>, cwd: &Path) -> String {
    declared.map(str::to_string).unwrap_or_else(|| dir_name(cwd))
}
