#![allow(dead_code)]

use serde_json::{Value, json};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Nothing listens here, so every run exercises the degraded-cache path.
pub const UNREACHABLE_CACHE: &str = "redis://127.0.0.1:1/0";

const CONTEXT_VARS: [&str; 10] = [
    "PROJECT_NAME",
    "CLAUDE_PROJECT_DIR",
    "GIT_REPO_NAME",
    "WORKTREE_NAME",
    "AGENT_COLOR",
    "AGENT_NAME",
    "ENGINEER_NAME",
    "REDIS_URL",
    "WORKTREE_HOOKS_CONFIG",
    "WORKTREE_HOOKS_LOG",
];

/// Run the binary with `args`, feeding `stdin`. The caller's context
/// variables are cleared first; `envs` are applied on top.
pub fn run_cli(args: &[&str], stdin: &str, envs: &[(&str, &str)]) -> (i32, String, String) {
    let mut command = Command::new(env!("CARGO_BIN_EXE_worktree-hooks"));
    command.args(args);
    for var in CONTEXT_VARS {
        command.env_remove(var);
    }
    command.env("REDIS_URL", UNREACHABLE_CACHE);
    command.envs(envs.iter().copied());

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");

    // Subcommands that never read stdin may have exited already.
    let _ = child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes());

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

pub fn run_hook(stdin: &Value, envs: &[(&str, &str)]) -> (i32, String, String) {
    run_cli(&["hook"], &stdin.to_string(), envs)
}

pub fn run_notify_hook(stdin: &Value, envs: &[(&str, &str)]) -> (i32, String, String) {
    run_cli(&["hook", "--notify"], &stdin.to_string(), envs)
}

/// Hook payload for `event` with the common fields filled in.
pub fn payload(event: &str, cwd: &Path, extra: Value) -> Value {
    let mut value = json!({
        "session_id": uuid::Uuid::new_v4().to_string(),
        "transcript_path": "/tmp/t.jsonl",
        "cwd": cwd.to_string_lossy(),
        "permission_mode": "default",
        "hook_event_name": event,
    });
    let map = value.as_object_mut().unwrap();
    if let Some(extra) = extra.as_object() {
        map.extend(extra.clone());
    }
    value
}

pub fn bash(cwd: &Path, command: &str) -> Value {
    payload(
        "PreToolUse",
        cwd,
        json!({
            "tool_name": "Bash",
            "tool_input": { "command": command },
            "tool_use_id": "toolu_001"
        }),
    )
}

/// Write `<dir>/.claude/worktree-hooks.toml`.
pub fn write_settings(dir: &Path, toml: &str) {
    let claude = dir.join(".claude");
    std::fs::create_dir_all(&claude).unwrap();
    std::fs::write(claude.join("worktree-hooks.toml"), toml).unwrap();
}

/// Parse stdout as hook output and return its `systemMessage`.
pub fn system_message(stdout: &str) -> String {
    let value: Value = serde_json::from_str(stdout.trim()).expect("stdout is hook JSON");
    value["systemMessage"]
        .as_str()
        .expect("systemMessage present")
        .to_string()
}

/// Create a temp dir containing a git repo with an initial commit and return it.
/// The `TempDir` must be kept alive for the duration of the test.
pub fn temp_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();

    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test").unwrap();
    config.set_str("user.email", "test@test.com").unwrap();

    let sig = repo.signature().unwrap();
    let tree_oid = repo.index().unwrap().write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    dir
}
