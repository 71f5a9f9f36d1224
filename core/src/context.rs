use std::sync::Arc;

use crate::config::AppConfig;
use crate::daemon::Daemon;
use crate::error::DaemonError;
use crate::queue::{SettingsProvider, TaskQueue};
use crate::runner::CommandRunner;

#[derive(Clone)]
pub struct Services {
    pub queue: Arc<dyn TaskQueue>,
    pub settings: Option<Arc<dyn SettingsProvider>>,
    pub runner: Arc<dyn CommandRunner>,
}

#[async_trait::async_trait]
pub trait ServicesFactory: Send + Sync {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, DaemonError>;
}

#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    services_factory: Option<Arc<dyn ServicesFactory>>,
}

impl AppContext {
    pub fn new(cfg: AppConfig, services_factory: Option<Arc<dyn ServicesFactory>>) -> Self {
        Self {
            cfg,
            services_factory,
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn with_config(&self, cfg: AppConfig) -> Self {
        Self {
            cfg,
            services_factory: self.services_factory.clone(),
        }
    }

    pub async fn build_services(&self) -> Result<Services, DaemonError> {
        let Some(factory) = self.services_factory.as_ref() else {
            return Err(DaemonError::Config(
                "services_factory missing (cannot build queue/runner services)".into(),
            ));
        };
        factory.build_services(&self.cfg).await
    }

    pub async fn build_daemon(&self) -> Result<Daemon, DaemonError> {
        let services = self.build_services().await?;
        Ok(Daemon::from_services(&self.cfg, services))
    }
}
