use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::task::Task;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("placeholder regex");
}

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Working directory: {{context}}\n\n{{task}}";

pub const HISTORY_PROMPT_TEMPLATE: &str = "Working directory: {{context}}\n\n\
Conversation so far:\n{{history}}\n\n\
New request:\n{{task}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateVariant {
    Default,
    WithHistory,
}

impl TemplateVariant {
    pub fn for_task(task: &Task) -> Self {
        if task.include_history {
            Self::WithHistory
        } else {
            Self::Default
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::WithHistory => "with-history",
        }
    }

    pub fn required_placeholders(self) -> &'static [&'static str] {
        match self {
            Self::Default => &["context", "task"],
            Self::WithHistory => &["context", "task", "history"],
        }
    }
}

/// The two prompt variants; which one is used depends on the task's history flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplates {
    #[serde(default = "default_prompt")]
    pub default: String,
    #[serde(default = "history_prompt")]
    pub with_history: String,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

fn history_prompt() -> String {
    HISTORY_PROMPT_TEMPLATE.to_string()
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            default: default_prompt(),
            with_history: history_prompt(),
        }
    }
}

impl PromptTemplates {
    pub fn get(&self, variant: TemplateVariant) -> &str {
        match variant {
            TemplateVariant::Default => &self.default,
            TemplateVariant::WithHistory => &self.with_history,
        }
    }
}

/// Distinct placeholder names used by a template.
pub fn placeholders(template: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Replaces every `{{name}}`; names missing from `ctx` become empty strings.
pub fn substitute(template: &str, ctx: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            ctx.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn require_field(value: &str, field: &'static str) -> Result<(), RenderError> {
    if value.trim().is_empty() {
        return Err(RenderError::MissingField { field });
    }
    Ok(())
}

fn validate_task(task: &Task) -> Result<(), RenderError> {
    require_field(&task.text, "text")?;
    require_field(&task.context, "context")?;
    require_field(&task.model, "model")?;
    require_field(&task.reasoning, "reasoning")?;
    Ok(())
}

fn validate_template(template: &str, variant: TemplateVariant) -> Result<(), RenderError> {
    let present = placeholders(template);
    for &token in variant.required_placeholders() {
        if !present.contains(token) {
            return Err(RenderError::MissingPlaceholder {
                variant: variant.name(),
                token,
            });
        }
    }
    Ok(())
}

fn prompt_context(task: &Task) -> HashMap<&'static str, String> {
    HashMap::from([
        ("task", task.text.clone()),
        ("context", task.context.clone()),
        ("model", task.model.clone()),
        ("reasoning", task.reasoning.clone()),
        ("history", task.history.clone().unwrap_or_default()),
        ("task_id", task.id.clone()),
        ("project_id", task.project_id.clone().unwrap_or_default()),
        ("subproject_id", task.subproject_id.clone().unwrap_or_default()),
    ])
}

/// Renders the prompt for a task. Validation happens before any substitution.
pub fn render(task: &Task, templates: &PromptTemplates) -> Result<String, RenderError> {
    validate_task(task)?;
    let variant = TemplateVariant::for_task(task);
    let template = templates.get(variant);
    validate_template(template, variant)?;
    Ok(substitute(template, &prompt_context(task)))
}
