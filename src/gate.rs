//! Pre-execution classifier for destructive shell commands.
//!
//! Any recursive delete that mentions a broad target is flagged. A flagged
//! command is only let through when every path it names sits under one of
//! the allowed directory prefixes.

use regex::Regex;
use std::sync::LazyLock;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid gate pattern"))
        .collect()
}

/// Recursive-force spellings, matched against the normalized command.
static RECURSIVE_FORCE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\brm\s+.*-[a-z]*r[a-z]*f",
        r"\brm\s+.*-[a-z]*f[a-z]*r",
        r"\brm\s+--recursive\s+--force",
        r"\brm\s+--force\s+--recursive",
        r"\brm\s+-r\s+.*-f",
        r"\brm\s+-f\s+.*-r",
    ])
});

static RECURSIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brm\s+.*-[a-z]*r").expect("valid gate pattern"));

/// Targets that make any recursive delete dangerous.
static DANGEROUS_TARGETS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"/",
        r"/\*",
        r"~",
        r"~/",
        r"\$\{?home\}?",
        r"\.\.",
        r"\*",
        r"\.",
        r"\.\s*$",
    ])
});

/// Everything after `rm` and its leading flags.
static RM_ARGUMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brm\s+(?:-\w+\s+|--[\w-]+\s+)*(.+)$").expect("valid gate pattern")
});

fn collapse_whitespace(command: &str) -> String {
    command.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase with runs of whitespace collapsed to single spaces.
pub fn normalize(command: &str) -> String {
    collapse_whitespace(&command.to_lowercase())
}

/// Whether the command looks like a destructive recursive delete,
/// before any allow-list is applied.
pub fn is_flagged(command: &str) -> bool {
    let normalized = normalize(command);
    if RECURSIVE_FORCE.iter().any(|re| re.is_match(&normalized)) {
        return true;
    }
    RECURSIVE.is_match(&normalized)
        && DANGEROUS_TARGETS.iter().any(|re| re.is_match(&normalized))
}

/// Path arguments of the `rm` invocation, quotes stripped. Empty strings
/// (`''`) are dropped.
pub fn target_paths(command: &str) -> Vec<String> {
    let collapsed = collapse_whitespace(command);
    let Some(caps) = RM_ARGUMENTS.captures(&collapsed) else {
        return Vec::new();
    };
    caps[1]
        .split_whitespace()
        .map(|p| p.trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// `trees/x` and `./trees/x` are both under `trees/`. A path with a `..`
/// segment is never allowed, since it can climb out of the prefix.
pub fn is_allowed_path(path: &str, allowed: &[String]) -> bool {
    let path = path.strip_prefix("./").unwrap_or(path);
    if path.split('/').any(|segment| segment == "..") {
        return false;
    }
    allowed
        .iter()
        .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
}

/// Classify `command`. Returns `true` when it must be blocked.
pub fn classify(command: &str, allowed: &[String]) -> bool {
    if !is_flagged(command) {
        return false;
    }
    let paths = target_paths(command);
    let all_allowed = !paths.is_empty() && paths.iter().all(|p| is_allowed_path(p, allowed));
    !all_allowed
}

/// Explanation printed when a command is blocked.
pub fn block_reason(allowed: &[String]) -> String {
    let dirs = if allowed.is_empty() {
        "(none configured)".to_string()
    } else {
        allowed.join(", ")
    };
    format!(
        "BLOCKED: Dangerous rm command detected and prevented\n\
         Tip: rm -rf is only allowed in these directories: {dirs}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn defaults() -> Vec<String> {
        dirs(&["trees/", "worktrees/"])
    }

    #[test]
    fn allowed_scratch_delete() {
        assert!(!classify("rm -rf trees/scratch", &defaults()));
        assert!(!classify("rm -rf ./worktrees/blue", &defaults()));
        assert!(!classify("rm -rf 'trees/a' \"worktrees/b\"", &defaults()));
        assert!(!classify("RM   -RF\ttrees/scratch", &defaults()));
    }

    #[test]
    fn home_directory_is_dangerous() {
        assert!(classify("rm -rf ~", &[]));
        assert!(classify("rm -rf ~/", &defaults()));
        assert!(classify("rm -rf $HOME", &defaults()));
        assert!(classify("rm -r ${HOME}/projects", &defaults()));
    }

    #[test]
    fn one_path_outside_allow_list_voids_override() {
        assert!(classify("rm -rf trees/a /etc", &dirs(&["trees/"])));
    }

    #[test]
    fn long_flags() {
        assert!(classify("rm --recursive --force /", &[]));
        assert!(classify("rm --force --recursive build", &defaults()));
        assert!(!classify("rm --recursive --force trees/old", &defaults()));
    }

    #[test]
    fn short_flag_spellings() {
        for command in [
            "rm -rf build",
            "rm -fr build",
            "rm -Rf build",
            "rm -rfv build",
            "rm -vrf build",
            "rm -r -f build",
            "rm -f -r build",
            "rm -r build -f",
            "sudo rm -rf /var/lib",
            "cd /tmp && rm -rf *",
        ] {
            assert!(classify(command, &defaults()), "{command}");
        }
    }

    #[test]
    fn recursive_delete_of_dangerous_targets() {
        for command in [
            "rm -r /",
            "rm -r /*",
            "rm -r ..",
            "rm -r ../sibling",
            "rm -r *",
            "rm -r .",
            "rm -R src/old",
        ] {
            assert!(classify(command, &defaults()), "{command}");
        }
    }

    #[test]
    fn harmless_commands_pass() {
        for command in [
            "",
            "   ",
            "ls -la",
            "rm notes.txt",
            "rm -f notes.txt",
            "rm -r build",
            "git rm --cached notes",
            "cargo build --release",
        ] {
            assert!(!classify(command, &defaults()), "{command:?}");
        }
    }

    #[test]
    fn empty_allow_list_never_overrides() {
        assert!(classify("rm -rf trees/scratch", &[]));
    }

    #[test]
    fn no_paths_never_override() {
        assert!(classify("rm -rf", &defaults()));
        assert!(classify("rm -rf ''", &defaults()));
    }

    #[test]
    fn chained_commands_count_as_paths() {
        assert!(classify("rm -rf trees/a && rm -rf /", &defaults()));
        assert!(classify("rm -rf trees/a; ls", &defaults()));
    }

    #[test]
    fn prefix_must_match_from_start() {
        assert!(classify("rm -rf src/trees/x", &defaults()));
        assert!(classify("rm -rf /trees/x", &defaults()));
        assert!(classify("rm -rf treesx/", &defaults()));
    }

    #[test]
    fn parent_segments_escape_the_allow_list() {
        assert!(classify("rm -rf trees/../..", &defaults()));
        assert!(classify("rm -rf worktrees/a/../../etc", &defaults()));
        assert!(classify("rm -rf ./trees/..", &defaults()));
        assert!(classify("rm -rf trees/a trees/../src", &defaults()));
        assert!(!is_allowed_path("trees/../src", &defaults()));
        // Dots inside a name are not a parent segment.
        assert!(!classify("rm -rf trees/a..b", &defaults()));
        assert!(is_allowed_path("trees/..hidden", &defaults()));
    }

    #[test]
    fn extracts_paths_after_flags() {
        assert_eq!(
            target_paths("rm -rf --no-preserve-root 'a b' c"),
            vec!["a", "b", "c"]
        );
        assert_eq!(target_paths("rm -r -f ./trees/x"), vec!["./trees/x"]);
        assert!(target_paths("ls -la").is_empty());
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  RM\t-RF \n /Tmp  "), "rm -rf /tmp");
    }

    #[test]
    fn reason_names_allowed_directories() {
        let reason = block_reason(&defaults());
        assert!(reason.starts_with("BLOCKED:"));
        assert!(reason.contains("trees/, worktrees/"));
        assert!(block_reason(&[]).contains("(none configured)"));
    }
}
