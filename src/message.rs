use crate::announce::{self, PhraseGenerator};
use crate::config::{Config, MessageSettings, TemplateOverrides};
use minijinja::{Environment, context};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::warn;

/// Which hook is speaking. Each call site has its own wording; the level
/// selection is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The agent is waiting for the human.
    Notification,
    /// The agent finished its turn.
    Completion,
    /// A subagent finished. Never personalized.
    Subagent,
}

/// How much context is available, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    AgentTask,
    AgentProject,
    Project,
    Fallback,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageContext<'a> {
    pub agent_name: Option<&'a str>,
    pub project_name: Option<&'a str>,
    pub task_slug: Option<&'a str>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl Level {
    pub fn select(ctx: &MessageContext) -> Self {
        let agent = present(ctx.agent_name).is_some();
        let project = present(ctx.project_name).is_some();
        let task = present(ctx.task_slug).is_some();
        match (agent, task, project) {
            (true, true, _) => Level::AgentTask,
            (true, false, true) => Level::AgentProject,
            (_, _, true) => Level::Project,
            _ => Level::Fallback,
        }
    }
}

const COMPLETION_PHRASES: [&str; 5] = [
    "Work complete!",
    "All done!",
    "Task finished!",
    "Job complete!",
    "Ready for next task!",
];

fn builtin(kind: MessageKind, level: Level) -> &'static str {
    use Level::*;
    use MessageKind::*;
    match (kind, level) {
        (Notification, AgentTask) => {
            "{{ lead }} {{ agent_name }} working on {{ task_slug }} needs your input"
        }
        (Notification, AgentProject) => {
            "{{ lead }} {{ agent_name }} on {{ project_name }} needs your input"
        }
        (Notification, Project) => "{{ lead }} agent on {{ project_name }} needs your input",
        (Notification, Fallback) => "{{ lead }} agent needs your input",
        (Completion, AgentTask) => {
            "{{ lead }} {{ agent_name }} working on {{ task_slug }} has finished and is ready for the next task"
        }
        (Completion, AgentProject) => {
            "{{ lead }} {{ agent_name }} on {{ project_name }} has finished and is ready for the next task"
        }
        (Completion, Project) => {
            "{{ lead }} agent on {{ project_name }} has finished and is ready for the next task"
        }
        // A generated or canned phrase unless overridden.
        (Completion, Fallback) => "{{ phrase }}",
        (Subagent, AgentTask) => "{{ agent_name }} subagent working on {{ task_slug }} complete",
        (Subagent, AgentProject) => "{{ agent_name }} subagent complete on {{ project_name }}",
        (Subagent, Project) => "Subagent complete on {{ project_name }}",
        (Subagent, Fallback) => "Subagent complete",
    }
}

fn override_for(overrides: &TemplateOverrides, level: Level) -> Option<&str> {
    match level {
        Level::AgentTask => overrides.agent_task.as_deref(),
        Level::AgentProject => overrides.agent_project.as_deref(),
        Level::Project => overrides.project.as_deref(),
        Level::Fallback => overrides.fallback.as_deref(),
    }
}

/// Builds the spoken status sentence for a hook from whatever context was
/// resolved.
pub struct MessageComposer<'a> {
    engineer_name: Option<&'a str>,
    templates: &'a MessageSettings,
    generators: &'a [Box<dyn PhraseGenerator>],
}

impl<'a> MessageComposer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            engineer_name: present(config.engineer_name.as_deref()),
            templates: &config.settings.messages,
            generators: &[],
        }
    }

    /// Ask `generators` for the context-free completion phrase before
    /// falling back to a canned one.
    pub fn with_generators(mut self, generators: &'a [Box<dyn PhraseGenerator>]) -> Self {
        self.generators = generators;
        self
    }

    /// Compose the message for `kind`.
    ///
    /// When an engineer name is configured it leads the sentence on a coin
    /// flip drawn from `rng` on every call. Completion messages with no
    /// context at all use a generated phrase, or one of a few canned
    /// phrases when no generator produces one.
    pub fn compose<R: Rng>(&self, kind: MessageKind, ctx: &MessageContext, rng: &mut R) -> String {
        let level = Level::select(ctx);
        let engineer = match kind {
            MessageKind::Subagent => None,
            _ => self.engineer_name,
        };
        let lead = match engineer {
            Some(name) if rng.random_bool(0.5) => format!("{name}, your"),
            _ => "Your".to_string(),
        };
        let phrase = if (kind, level) == (MessageKind::Completion, Level::Fallback) {
            announce::generate_phrase(self.generators).unwrap_or_else(|| {
                COMPLETION_PHRASES
                    .choose(rng)
                    .copied()
                    .unwrap_or(COMPLETION_PHRASES[0])
                    .to_string()
            })
        } else {
            String::new()
        };
        let vars = context! {
            lead,
            phrase,
            engineer_name => engineer,
            agent_name => present(ctx.agent_name),
            project_name => present(ctx.project_name),
            task_slug => present(ctx.task_slug),
        };

        let overrides = match kind {
            MessageKind::Notification => &self.templates.notification,
            MessageKind::Completion => &self.templates.completion,
            MessageKind::Subagent => &self.templates.subagent,
        };
        if let Some(custom) = override_for(overrides, level) {
            match render(custom, &vars) {
                Ok(message) => return message,
                Err(err) => warn!(?kind, ?level, "message template override failed: {err}"),
            }
        }

        let source = builtin(kind, level);
        render(source, &vars).unwrap_or_else(|err| {
            warn!(?kind, ?level, "built-in message template failed: {err}");
            source.to_string()
        })
    }
}

fn render(source: &str, vars: &minijinja::Value) -> Result<String, minijinja::Error> {
    let env = Environment::new();
    let template = env.template_from_str(source)?;
    template.render(vars)
}
