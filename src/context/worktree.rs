use super::{now_epoch, scope_name};
use crate::cache::{CONTEXT_TTL, TtlCache, keys};
use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    Main,
    WorktreeAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Path,
    Environment,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorktreeContext {
    pub is_worktree: bool,
    pub worktree_name: Option<String>,
    pub agent_color: Option<String>,
    pub agent_name: Option<String>,
    pub worktree_path: Option<String>,
    pub agent_type: AgentType,
    pub detection_method: DetectionMethod,
    pub last_updated: f64,
}

impl WorktreeContext {
    /// The main checkout: no agent detected.
    pub fn main() -> Self {
        Self {
            is_worktree: false,
            worktree_name: None,
            agent_color: None,
            agent_name: None,
            worktree_path: None,
            agent_type: AgentType::Main,
            detection_method: DetectionMethod::None,
            last_updated: now_epoch(),
        }
    }
}

const AGENT_NAMES: [(&str, &str); 6] = [
    ("blue", "Blue Guardian"),
    ("red", "Red Sentinel"),
    ("white", "White Oracle"),
    ("green", "Green Protector"),
    ("yellow", "Yellow Warden"),
    ("purple", "Purple Sage"),
];

/// Display name for an agent color; unknown colors become `"<Color> Agent"`.
pub fn default_agent_name(color: &str) -> String {
    AGENT_NAMES
        .iter()
        .find(|(c, _)| *c == color)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("{} Agent", title_case(color)))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(ch);
            word_start = true;
        }
    }
    out
}

/// Worktree directory name and agent color found in a path.
#[derive(Debug, PartialEq)]
pub struct PathMatch {
    pub worktree_name: String,
    pub color: String,
}

/// Scan `path` left to right for `agents/agent_<color>`,
/// `worktrees/agent_<color>` or `worktrees/<color>`. The shallowest match
/// wins.
pub fn detect_from_path(path: &Path) -> Option<PathMatch> {
    let segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    segments.windows(2).find_map(|pair| {
        let (part, next) = (pair[0].as_str(), &pair[1]);
        if part != "agents" && part != "worktrees" {
            return None;
        }
        let color = match next.strip_prefix("agent_") {
            Some(color) => color,
            None if part == "worktrees" => next.as_str(),
            None => return None,
        };
        Some(PathMatch {
            worktree_name: next.clone(),
            color: color.to_string(),
        })
    })
}

/// Resolve which agent checkout `cwd` belongs to.
///
/// A cached snapshot is only consulted when the agent color is declared in
/// the configuration. Otherwise the path is scanned, then explicit
/// overrides replace whatever the path suggested. Contexts with an agent
/// color are written back to the cache.
pub fn resolve(cwd: &Path, config: &Config, cache: &mut TtlCache) -> WorktreeContext {
    let project = scope_name(config.project_name.as_deref(), cwd);
    let overrides = &config.worktree;

    if let Some(color) = overrides.agent_color.as_deref() {
        if !project.is_empty() {
            let key = keys::worktree_context(&project, color);
            if let Some(cached) = cache.get::<WorktreeContext>(&key) {
                debug!(project = %project, color, "worktree context from cache");
                return cached;
            }
        }
    }

    let mut context = WorktreeContext::main();

    if let Some(found) = detect_from_path(cwd) {
        context.is_worktree = true;
        context.worktree_name = Some(found.worktree_name);
        context.agent_color = Some(found.color);
        context.worktree_path = Some(cwd.to_string_lossy().into_owned());
        context.agent_type = AgentType::WorktreeAgent;
        context.detection_method = DetectionMethod::Path;
    }

    if overrides.worktree_name.is_some() || overrides.agent_color.is_some() {
        context.is_worktree = true;
        context.agent_type = AgentType::WorktreeAgent;
        context.detection_method = DetectionMethod::Environment;
        if let Some(name) = &overrides.worktree_name {
            context.worktree_name = Some(name.clone());
        }
        if let Some(color) = &overrides.agent_color {
            context.agent_color = Some(color.clone());
        }
    }
    if let Some(name) = &overrides.agent_name {
        context.agent_name = Some(name.clone());
    }

    let color = context.agent_color.clone().filter(|c| !c.is_empty());
    if let Some(color) = color {
        if context.agent_name.is_none() {
            context.agent_name = Some(default_agent_name(&color));
        }
        if !project.is_empty() {
            cache.set(
                &keys::worktree_context(&project, &color),
                &context,
                CONTEXT_TTL,
            );
        }
    }
    context
}
