//! `{{placeholder}}` rendering for prompts and shell command lines.

mod command;
mod prompt;

pub use command::{
    inspect_command_template, normalize_command_template, render_command,
    COMMAND_PLACEHOLDERS, DEFAULT_COMMAND_TEMPLATE,
};
pub use prompt::{
    placeholders, render, substitute, PromptTemplates, TemplateVariant,
    DEFAULT_PROMPT_TEMPLATE, HISTORY_PROMPT_TEMPLATE,
};
