//! `ServicesFactory` backed by the HTTP queue and the shell runner.
use async_trait::async_trait;
use taskpilot_core::api::{AppConfig, DaemonError, Services, ServicesFactory};

use crate::factory;

#[derive(Default)]
pub struct PluginServicesFactory;

#[async_trait]
impl ServicesFactory for PluginServicesFactory {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, DaemonError> {
        let queue = factory::build_queue(cfg).map_err(|e| DaemonError::Config(format!("{e:#}")))?;
        Ok(Services {
            queue: queue.clone(),
            settings: Some(queue),
            runner: factory::build_runner(cfg),
        })
    }
}
