use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Meta,
    Task,
    Command,
    Output,
    Success,
    Failure,
    Stopped,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Task => "task",
            Self::Command => "command",
            Self::Output => "output",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Stopped => "stopped",
        }
    }
}

fn sanitize_file_stem(id: &str) -> String {
    let s: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.is_empty() {
        "unnamed".to_string()
    } else {
        s
    }
}

/// Keeps a message on a single line.
fn escape_message(message: &str) -> String {
    message
        .trim_end()
        .replace('\\', "\\\\")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}

fn format_line(status: AuditStatus, message: &str, payload: Option<&Value>) -> String {
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut line = format!("{ts} [{}] {}", status.as_str(), escape_message(message));
    if let Some(payload) = payload {
        match serde_json::to_string(payload) {
            Ok(json) => {
                line.push(' ');
                line.push_str(&json);
            }
            Err(e) => line.push_str(&format!(" <unserializable payload: {e}>")),
        }
    }
    line.push('\n');
    line
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

/// Factory for per-task audit handles. A logger without a directory is a no-op.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger {
    dir: Option<PathBuf>,
}

impl AuditLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn for_task(&self, task_id: &str) -> TaskAudit {
        TaskAudit {
            task_id: task_id.to_string(),
            path: self
                .dir
                .as_ref()
                .map(|d| d.join(format!("task-{}.log", sanitize_file_stem(task_id)))),
        }
    }

    /// Daemon-wide entries (startup, settings changes).
    pub fn daemon(&self) -> TaskAudit {
        TaskAudit {
            task_id: "daemon".to_string(),
            path: self.dir.as_ref().map(|d| d.join("daemon.log")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskAudit {
    task_id: String,
    path: Option<PathBuf>,
}

impl TaskAudit {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends one entry. Write failures are logged and swallowed.
    pub async fn log(&self, status: AuditStatus, message: &str, payload: Option<&Value>) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let line = format_line(status, message, payload);
        if let Err(e) = append_line(path, &line).await {
            tracing::warn!(
                target: "taskpilot.audit",
                task_id = %self.task_id,
                path = %path.display(),
                error = %e,
                "audit write failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn creates_directory_and_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("audit");
        let logger = AuditLogger::new(&dir);
        let audit = logger.for_task("task/1");

        audit.log(AuditStatus::Task, "received", Some(&json!({"id": "task/1"}))).await;
        audit.log(AuditStatus::Success, "done", None).await;

        let path = dir.join("task-task_1.log");
        let body = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[task] received {\"id\":\"task/1\"}"));
        assert!(lines[1].ends_with("[success] done"));
    }

    #[test]
    fn multiline_message_stays_on_one_line() {
        let line = format_line(
            AuditStatus::Failure,
            "first\nsecond\r\nthird\n",
            Some(&json!({"output": "a\nb"})),
        );
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with("[failure] first\\nsecond\\r\\nthird {\"output\":\"a\\nb\"}\n"));
    }

    #[tokio::test]
    async fn disabled_logger_writes_nothing() {
        let audit = AuditLogger::disabled().for_task("t1");
        assert!(audit.path().is_none());
        audit.log(AuditStatus::Meta, "ignored", None).await;
    }

    #[tokio::test]
    async fn unwritable_target_does_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let audit = AuditLogger::new(blocker.join("sub")).for_task("t1");
        audit.log(AuditStatus::Failure, "still fine", None).await;
    }
}
