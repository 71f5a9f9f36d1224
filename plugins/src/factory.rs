use std::sync::Arc;

use anyhow::Result;
use taskpilot_core::api::{AppConfig, CommandRunner};

use crate::queue::HttpTaskQueue;
use crate::runner::ShellCommandRunner;

pub fn build_queue(cfg: &AppConfig) -> Result<Arc<HttpTaskQueue>> {
    let q = &cfg.queue;
    Ok(Arc::new(HttpTaskQueue::new(
        &q.base_url,
        q.api_key.clone(),
        q.timeout_ms,
    )?))
}

pub fn build_runner(_cfg: &AppConfig) -> Arc<dyn CommandRunner> {
    Arc::new(ShellCommandRunner::default())
}
