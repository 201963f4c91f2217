use serde::{Deserialize, Serialize};

// ===================================================================
// Hook Input Types (received via stdin, snake_case JSON)
// ===================================================================

/// Fields shared by all hook event inputs. Only the ones the hooks act on
/// are kept; the rest of the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonInput {
    /// Working directory of the agent. Empty when the caller left it out.
    #[serde(default)]
    pub cwd: String,
}

#[derive(Debug, Deserialize)]
pub struct PreToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct NotificationInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StopInput {
    #[serde(flatten)]
    pub common: CommonInput,
}

#[derive(Debug, Deserialize)]
pub struct SubagentStopInput {
    #[serde(flatten)]
    pub common: CommonInput,
}

/// Top-level hook input, deserialized from stdin JSON.
///
/// Tagged by the `hook_event_name` field. Events these hooks don't act on
/// land in [`HookInput::Other`].
#[derive(Debug, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    PreToolUse(PreToolUseInput),
    Notification(NotificationInput),
    Stop(StopInput),
    SubagentStop(SubagentStopInput),
    #[serde(other)]
    Other,
}

impl HookInput {
    /// Common fields, when the event is one we parse.
    pub fn common(&self) -> Option<&CommonInput> {
        match self {
            Self::PreToolUse(e) => Some(&e.common),
            Self::Notification(e) => Some(&e.common),
            Self::Stop(e) => Some(&e.common),
            Self::SubagentStop(e) => Some(&e.common),
            Self::Other => None,
        }
    }
}

// ===================================================================
// Tool-Specific Input Types
// ===================================================================

/// Parsed tool call, matching `tool_name` to a typed `tool_input`.
#[derive(Debug)]
pub enum ToolCall {
    Bash(BashToolInput),
    /// Every other tool. The gate only inspects shell commands.
    Other,
}

impl PreToolUseInput {
    /// Parse `tool_name` + `tool_input` into a typed `ToolCall`.
    pub fn tool_call(&self) -> Result<ToolCall, serde_json::Error> {
        ToolCall::parse(&self.tool_name, &self.tool_input)
    }
}

impl ToolCall {
    pub fn parse(
        tool_name: &str,
        tool_input: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        match tool_name {
            "Bash" => Ok(Self::Bash(serde_json::from_value(tool_input.clone())?)),
            _ => Ok(Self::Other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BashToolInput {
    #[serde(default)]
    pub command: String,
}

// ===================================================================
// Hook Output Types (written to stdout as JSON, camelCase)
// ===================================================================

/// Top-level hook output written to stdout on exit code 0.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Message shown to the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

impl HookOutput {
    pub fn system_message(message: impl Into<String>) -> Self {
        Self {
            system_message: Some(message.into()),
        }
    }
}
