use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditStatus, TaskAudit};
use crate::error::RenderError;
use crate::runner::{CommandRequest, CommandRunner};
use crate::task::{Task, TaskExecutionResult, TaskOutcome};
use crate::template::{self, PromptTemplates};
use crate::util::truncate_chars;

use super::classify::classify_output;

/// Prompt variants plus the command template for one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerTemplates {
    pub prompts: PromptTemplates,
    /// `None` or blank falls back to the worker's default command template.
    pub command: Option<String>,
}

pub struct WorkerContext<'a> {
    pub cancel: CancellationToken,
    pub audit: &'a TaskAudit,
}

pub struct SubprocessWorker {
    runner: Arc<dyn CommandRunner>,
    default_command: String,
    stop_grace: Duration,
    output_cap: usize,
}

impl SubprocessWorker {
    pub fn new(runner: Arc<dyn CommandRunner>, default_command: impl Into<String>) -> Self {
        Self {
            runner,
            default_command: default_command.into(),
            stop_grace: Duration::from_secs(5),
            output_cap: 4_000,
        }
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn with_output_cap(mut self, cap: usize) -> Self {
        self.output_cap = cap;
        self
    }

    pub fn runner_name(&self) -> &str {
        self.runner.name()
    }

    fn command_template<'t>(&'t self, templates: &'t WorkerTemplates) -> &'t str {
        templates
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(self.default_command.as_str())
    }

    /// Renders and runs one task.
    ///
    /// Validation problems surface as `Err` before anything is spawned. Once
    /// rendering succeeds every outcome, including spawn errors, is an `Ok`
    /// result.
    pub async fn execute(
        &self,
        task: &Task,
        templates: &WorkerTemplates,
        ctx: WorkerContext<'_>,
    ) -> Result<TaskExecutionResult, RenderError> {
        let audit = ctx.audit;
        let payload = serde_json::to_value(task).unwrap_or_else(|_| json!({ "id": task.id }));
        audit
            .log(AuditStatus::Task, "Task payload received", Some(&payload))
            .await;

        let message = template::render(task, &templates.prompts)?;
        let command_line = template::render_command(self.command_template(templates), task, &message);

        audit
            .log(
                AuditStatus::Command,
                "Invoking command",
                Some(&json!({ "runner": self.runner.name(), "command": command_line })),
            )
            .await;
        tracing::info!(
            target: "taskpilot.worker",
            task_id = %task.id,
            runner = %self.runner.name(),
            "spawning task process"
        );

        let request = CommandRequest {
            task_id: task.id.clone(),
            command_line,
            stop_grace: self.stop_grace,
        };

        let output = match self.runner.run(&request, ctx.cancel.clone()).await {
            Ok(out) => out,
            Err(e) => {
                let diagnostic = format!("{e:#}");
                tracing::warn!(
                    target: "taskpilot.worker",
                    task_id = %task.id,
                    error = %diagnostic,
                    "task process could not be run"
                );
                audit
                    .log(
                        AuditStatus::Failure,
                        "Command runner error",
                        Some(&json!({ "error": diagnostic })),
                    )
                    .await;
                return Ok(TaskExecutionResult::failed(diagnostic));
            }
        };

        let outcome = classify_output(&task.id, &output);

        // A cancelled run has already been recorded as stopped.
        if ctx.cancel.is_cancelled() {
            tracing::debug!(
                target: "taskpilot.worker",
                task_id = %task.id,
                exit_code = ?output.exit_code,
                signal = ?output.signal,
                "task process ended after cancellation"
            );
            return Ok(TaskExecutionResult::now(outcome));
        }

        audit
            .log(
                AuditStatus::Output,
                "Process output",
                Some(&json!({
                    "exitCode": output.exit_code,
                    "signal": output.signal,
                    "output": truncate_chars(&output.combined(), self.output_cap),
                })),
            )
            .await;

        match &outcome {
            TaskOutcome::Done { .. } => {
                audit.log(AuditStatus::Success, "Task completed", None).await;
            }
            TaskOutcome::Failed { diagnostic } => {
                let first_line = diagnostic.lines().next().unwrap_or_default();
                audit.log(AuditStatus::Failure, first_line, None).await;
            }
            TaskOutcome::Stopped { .. } => {}
        }

        Ok(TaskExecutionResult::now(outcome))
    }
}
