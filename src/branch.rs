use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const FEATURE_PREFIX: &str = "feat/";

const BRANCH_COLORS: [&str; 8] = [
    "blue", "red", "white", "green", "yellow", "purple", "orange", "pink",
];

/// `<color>-<slug>`, where the slug must be non-empty.
static COLOR_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+)-(.+)$").expect("valid color/slug pattern"));

/// Metadata encoded in a `feat/...` branch name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureBranchMetadata {
    pub is_feature_branch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_slug: Option<String>,
}

/// Parse `feat/<color>-<slug>` or `feat/<slug>`.
///
/// The color is only split off when it is one of the known agent colors
/// and something follows the hyphen; otherwise the whole remainder is the
/// slug. So `feat/blue-` yields the slug `blue-`, not an empty slug.
/// Anything outside `feat/` carries no metadata.
pub fn parse(branch: &str) -> FeatureBranchMetadata {
    let Some(remainder) = branch.strip_prefix(FEATURE_PREFIX) else {
        return FeatureBranchMetadata::default();
    };

    if let Some(caps) = COLOR_SLUG.captures(remainder) {
        let color = &caps[1];
        if BRANCH_COLORS.contains(&color) {
            return FeatureBranchMetadata {
                is_feature_branch: true,
                color: Some(color.to_string()),
                task_slug: Some(caps[2].to_string()),
            };
        }
    }

    FeatureBranchMetadata {
        is_feature_branch: true,
        color: None,
        task_slug: Some(remainder.to_string()),
    }
}
