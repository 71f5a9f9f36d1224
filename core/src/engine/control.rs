use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Weak;

use tokio_util::sync::CancellationToken;

use crate::audit::AuditStatus;
use crate::error::DaemonError;
use crate::task::TaskOutcome;

use super::cycle::CycleRuntime;

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const STOPPED: u8 = 2;

/// Per-task control handle, alive from reservation until the task settles.
///
/// The settle flag is written exactly once: by natural completion or by
/// `force_stop`, whichever comes first. The loser does nothing.
pub struct RunningTaskControl {
    task_id: String,
    cancel: CancellationToken,
    state: AtomicU8,
    runtime: Weak<CycleRuntime>,
}

impl RunningTaskControl {
    pub(crate) fn new(task_id: impl Into<String>, runtime: Weak<CycleRuntime>) -> Self {
        Self {
            task_id: task_id.into(),
            cancel: CancellationToken::new(),
            state: AtomicU8::new(RUNNING),
            runtime,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }

    pub fn is_settled(&self) -> bool {
        self.state.load(Ordering::Acquire) != RUNNING
    }

    fn settle(&self, to: u8) -> bool {
        self.state
            .compare_exchange(RUNNING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claims the right to report a natural completion.
    pub(crate) fn try_complete(&self) -> bool {
        self.settle(COMPLETED)
    }

    /// Cancels the task and reports it as stopped. Returns `Ok(false)` when the
    /// task had already settled, in which case nothing happens.
    pub async fn force_stop(&self) -> Result<bool, DaemonError> {
        if !self.settle(STOPPED) {
            return Ok(false);
        }
        self.cancel.cancel();

        let Some(runtime) = self.runtime.upgrade() else {
            return Ok(true);
        };

        runtime
            .audit
            .for_task(&self.task_id)
            .log(AuditStatus::Stopped, "Task force-stopped by operator", None)
            .await;

        let reported = runtime
            .reporter
            .report_outcome(
                &self.task_id,
                &TaskOutcome::Stopped {
                    reason: runtime.stopped_reason.clone(),
                },
            )
            .await;

        runtime.release(self);
        reported.map(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_settle_wins() {
        let c = RunningTaskControl::new("t", Weak::new());
        assert!(c.try_complete());
        assert!(!c.force_stop().await.unwrap());
        assert!(!c.is_stopped());
        assert!(!c.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn force_stop_is_idempotent() {
        let c = RunningTaskControl::new("t", Weak::new());
        assert!(c.force_stop().await.unwrap());
        assert!(!c.force_stop().await.unwrap());
        assert!(c.is_stopped());
        assert!(c.cancel_token().is_cancelled());
        assert!(!c.try_complete());
    }
}
