use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::task::Task;

use super::prompt::{placeholders, substitute};

lazy_static! {
    static ref BRACED_TOKEN: Regex = Regex::new(r"(\{+)([A-Za-z_]+)(\}+)").expect("braced token regex");
    static ref LINE_CONTINUATION: Regex = Regex::new(r"\s*\\\r?\n\s*").expect("continuation regex");
}

pub const DEFAULT_COMMAND_TEMPLATE: &str = "codex exec --skip-git-repo-check --full-auto \
--cd \"{{context}}\" --model \"{{model}}\" \
-c model_reasoning_effort=\"{{reasoning}}\" \"{{message}}\"";

pub const COMMAND_PLACEHOLDERS: &[&str] = &["context", "model", "reasoning", "message", "task_id"];

/// Joins shell line continuations and folds the template onto one line.
pub fn normalize_command_template(raw: &str) -> String {
    let joined = LINE_CONTINUATION.replace_all(raw.trim(), " ");
    joined
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compatibility warnings for a command template. Never fatal.
pub fn inspect_command_template(template: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    if template.trim().is_empty() {
        warnings.push("command template is empty; the built-in default will be used".to_string());
        return warnings;
    }

    let used = placeholders(template);
    if !used.contains("message") {
        warnings.push(
            "command template has no {{message}} placeholder; the rendered prompt will not reach the process"
                .to_string(),
        );
    }
    if !used.contains("context") {
        warnings.push(
            "command template has no {{context}} placeholder; the process will run in the daemon's directory"
                .to_string(),
        );
    }
    for name in &used {
        if !COMMAND_PLACEHOLDERS.contains(&name.as_str()) {
            warnings.push(format!(
                "unknown placeholder {{{{{name}}}}} will render as an empty string"
            ));
        }
    }
    let single_braced = BRACED_TOKEN
        .captures_iter(template)
        .filter(|caps| caps[1].len() == 1 && caps[3].len() == 1);
    for caps in single_braced {
        warnings.push(format!(
            "single-brace token {{{}}} is not substituted; use {{{{{}}}}}",
            &caps[2], &caps[2]
        ));
    }
    warnings
}

/// Builds the literal shell command line. No quoting or escaping is applied:
/// the template is trusted and the caller hands the result to a shell as-is.
pub fn render_command(template: &str, task: &Task, message: &str) -> String {
    let ctx: HashMap<&str, String> = HashMap::from([
        ("context", task.context.clone()),
        ("model", task.model.clone()),
        ("reasoning", task.reasoning.clone()),
        ("message", message.to_string()),
        ("task_id", task.id.clone()),
    ]);
    substitute(&normalize_command_template(template), &ctx)
}
