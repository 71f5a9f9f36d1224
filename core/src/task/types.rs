use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::serde_utils::{deserialize_id, deserialize_opt_id};

/// A queued automation job as handed out by the queue collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    /// Free-text instruction for the automation process.
    #[serde(default)]
    pub text: String,

    /// Working directory / context path the process operates in.
    #[serde(default)]
    pub context: String,

    /// Lower sorts first; `None` sorts after every explicit priority.
    #[serde(default)]
    pub priority: Option<f64>,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub reasoning: String,

    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub project_id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub subproject_id: Option<String>,

    #[serde(default)]
    pub include_history: bool,

    /// Pre-rendered conversation history, used by the with-history template.
    #[serde(default)]
    pub history: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Done,
    Failed,
    Stopped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Statuses that carry a completion timestamp when reported.
    pub fn is_completion(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Done { response: String },
    Failed { diagnostic: String },
    Stopped { reason: String },
}

impl TaskOutcome {
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Done { .. } => TaskStatus::Done,
            Self::Failed { .. } => TaskStatus::Failed,
            Self::Stopped { .. } => TaskStatus::Stopped,
        }
    }

    /// Human-readable response or diagnostic text.
    pub fn message(&self) -> &str {
        match self {
            Self::Done { response } => response,
            Self::Failed { diagnostic } => diagnostic,
            Self::Stopped { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskExecutionResult {
    pub outcome: TaskOutcome,
    pub finished_at: DateTime<Utc>,
}

impl TaskExecutionResult {
    pub fn now(outcome: TaskOutcome) -> Self {
        Self {
            outcome,
            finished_at: Utc::now(),
        }
    }

    pub fn done(response: impl Into<String>) -> Self {
        Self::now(TaskOutcome::Done {
            response: response.into(),
        })
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self::now(TaskOutcome::Failed {
            diagnostic: diagnostic.into(),
        })
    }

    pub fn status(&self) -> TaskStatus {
        self.outcome.status()
    }

    pub fn response(&self) -> &str {
        self.outcome.message()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImmediateActionKind {
    ForceStop,
    /// Anything this daemon does not understand; acknowledged and ignored.
    #[serde(other)]
    Unknown,
}

/// Out-of-band operator request targeting a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmediateAction {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: ImmediateActionKind,
}
