//! Composite cache keys. Every key is scoped by project, and by worktree
//! where the value is worktree-specific, so agents never share entries.

pub fn project_context(project: &str) -> String {
    format!("project:{project}:context")
}

pub fn worktree_context(project: &str, color: &str) -> String {
    format!("project:{project}:worktree:{color}:context")
}

pub fn git_context(project: &str, worktree: Option<&str>) -> String {
    match worktree {
        Some(worktree) => format!("project:{project}:worktree:{worktree}:git"),
        None => format!("project:{project}:git"),
    }
}
