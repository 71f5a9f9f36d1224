use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::DaemonError;
use crate::queue::{StatusReport, TaskQueue};
use crate::task::{TaskExecutionResult, TaskOutcome, TaskStatus};
use crate::util::hex_lower;

/// Deterministic key over the identity of a report, so the collaborator can
/// drop a redelivered report after a crash/retry.
pub fn idempotency_key(task_id: &str, status: TaskStatus, full_response: Option<&str>) -> String {
    let identity = serde_json::json!({
        "taskId": task_id,
        "status": status.as_str(),
        "fullResponse": full_response,
    });
    let mut hasher = Sha256::new();
    hasher.update(identity.to_string().as_bytes());
    hex_lower(&hasher.finalize())
}

#[derive(Clone)]
pub struct StatusReporter {
    queue: Arc<dyn TaskQueue>,
}

impl StatusReporter {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    pub async fn report(
        &self,
        task_id: &str,
        status: TaskStatus,
        full_response: Option<&str>,
    ) -> Result<(), DaemonError> {
        let report = StatusReport {
            task_id: task_id.to_string(),
            status,
            finished_at: status.is_completion().then(Utc::now),
            full_response: full_response.map(str::to_string),
            idempotency_key: idempotency_key(task_id, status, full_response),
        };
        tracing::debug!(
            target: "taskpilot.report",
            task_id = %task_id,
            status = %status,
            key = %report.idempotency_key,
            "reporting task status"
        );
        self.queue
            .report_task_status(&report)
            .await
            .map_err(DaemonError::queue)
    }

    pub async fn report_outcome(
        &self,
        task_id: &str,
        outcome: &TaskOutcome,
    ) -> Result<(), DaemonError> {
        self.report(task_id, outcome.status(), Some(outcome.message()))
            .await
    }

    pub async fn report_result(
        &self,
        task_id: &str,
        result: &TaskExecutionResult,
    ) -> Result<(), DaemonError> {
        self.report_outcome(task_id, &result.outcome).await
    }
}
