use std::sync::Arc;

use crate::engine::InFlightRegistry;
use crate::error::DaemonError;
use crate::queue::TaskQueue;
use crate::task::{ImmediateAction, ImmediateActionKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub acknowledged: usize,
    pub stopped: usize,
}

/// Applies pending immediate actions against the in-flight registry.
pub struct ImmediateActionHandler {
    queue: Arc<dyn TaskQueue>,
    registry: InFlightRegistry,
}

impl ImmediateActionHandler {
    pub fn new(queue: Arc<dyn TaskQueue>, registry: InFlightRegistry) -> Self {
        Self { queue, registry }
    }

    /// Every fetched action is acknowledged exactly once. Collaborator errors
    /// abort the batch and propagate; unprocessed actions stay pending.
    pub async fn handle_pending(&self) -> Result<ActionReport, DaemonError> {
        let actions = self
            .queue
            .fetch_immediate_actions()
            .await
            .map_err(DaemonError::queue)?;

        let mut report = ActionReport::default();
        for action in actions {
            self.queue
                .acknowledge_immediate_action(&action.id)
                .await
                .map_err(DaemonError::queue)?;
            report.acknowledged += 1;

            match action.kind {
                ImmediateActionKind::ForceStop => {
                    if self.force_stop(&action).await? {
                        report.stopped += 1;
                    }
                }
                ImmediateActionKind::Unknown => {
                    tracing::warn!(
                        target: "taskpilot.actions",
                        action_id = %action.id,
                        task_id = %action.task_id,
                        "ignoring immediate action of unknown type"
                    );
                }
            }
        }
        Ok(report)
    }

    async fn force_stop(&self, action: &ImmediateAction) -> Result<bool, DaemonError> {
        let Some(control) = self.registry.control(&action.task_id) else {
            tracing::info!(
                target: "taskpilot.actions",
                action_id = %action.id,
                task_id = %action.task_id,
                "stop requested for a task that is not running"
            );
            return Ok(false);
        };

        let stopped = control.force_stop().await?;
        self.queue
            .complete_immediate_action(&action.id)
            .await
            .map_err(DaemonError::queue)?;
        if stopped {
            tracing::info!(
                target: "taskpilot.actions",
                action_id = %action.id,
                task_id = %action.task_id,
                "task force-stopped"
            );
        } else {
            tracing::debug!(
                target: "taskpilot.actions",
                task_id = %action.task_id,
                "task settled before the stop request was applied"
            );
        }
        Ok(stopped)
    }
}
