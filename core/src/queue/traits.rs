use async_trait::async_trait;

use crate::task::{ImmediateAction, Task};

use super::types::{SettingsPatch, StatusReport};

/// Remote queue the daemon claims work from and reports outcomes to.
///
/// `fetch_next_tasks` must atomically exclude tasks already claimed elsewhere.
/// `mark_tasks_in_progress` may be a no-op when claiming already marks them.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn fetch_next_tasks(&self, limit: usize) -> anyhow::Result<Vec<Task>>;
    async fn mark_tasks_in_progress(&self, ids: &[String]) -> anyhow::Result<()>;
    async fn fetch_immediate_actions(&self) -> anyhow::Result<Vec<ImmediateAction>>;
    async fn acknowledge_immediate_action(&self, id: &str) -> anyhow::Result<()>;
    async fn complete_immediate_action(&self, id: &str) -> anyhow::Result<()>;
    async fn report_task_status(&self, report: &StatusReport) -> anyhow::Result<()>;
}

/// Live settings source, polled once per tick.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn fetch_settings(&self) -> anyhow::Result<SettingsPatch>;
}
