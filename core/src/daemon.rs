//! Tick orchestration: settings refresh, immediate actions, execution cycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::actions::{ActionReport, ImmediateActionHandler};
use crate::audit::{AuditLogger, AuditStatus};
use crate::config::AppConfig;
use crate::context::Services;
use crate::engine::{CycleOptions, CycleReport, ExecutionCycle, Poller};
use crate::queue::{SettingsPatch, SettingsProvider};
use crate::template::{
    inspect_command_template, normalize_command_template, PromptTemplates,
    DEFAULT_COMMAND_TEMPLATE,
};
use crate::worker::{SubprocessWorker, WorkerTemplates};

/// Effective runtime settings: config-file values, optionally overlaid by the
/// settings collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonSettings {
    pub max_parallel_tasks: f64,
    pub poll_interval: Duration,
    pub command_template: String,
    pub prompts: PromptTemplates,
}

impl DaemonSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_parallel_tasks: cfg.daemon.max_parallel_tasks as f64,
            poll_interval: Duration::from_millis(cfg.daemon.poll_interval_ms),
            command_template: cfg.templates.command.clone(),
            prompts: PromptTemplates {
                default: cfg.templates.prompt_default.clone(),
                with_history: cfg.templates.prompt_with_history.clone(),
            },
        }
    }

    /// Absent or blank patch fields keep the current value.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        fn text(v: &Option<String>) -> Option<&String> {
            v.as_ref().filter(|s| !s.trim().is_empty())
        }

        let mut next = self.clone();
        if let Some(n) = patch.max_parallel_tasks {
            next.max_parallel_tasks = n;
        }
        if let Some(ms) = patch.poll_interval_ms.filter(|ms| *ms > 0) {
            next.poll_interval = Duration::from_millis(ms);
        }
        if let Some(cmd) = text(&patch.command_template) {
            next.command_template = cmd.clone();
        }
        if let Some(p) = text(&patch.prompt_template) {
            next.prompts.default = p.clone();
        }
        if let Some(p) = text(&patch.prompt_template_with_history) {
            next.prompts.with_history = p.clone();
        }
        next
    }

    pub fn worker_templates(&self) -> WorkerTemplates {
        WorkerTemplates {
            prompts: self.prompts.clone(),
            command: Some(normalize_command_template(&self.command_template)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub settings_refreshed: bool,
    pub actions: Option<ActionReport>,
    pub cycle: Option<CycleReport>,
}

struct DaemonInner {
    instance_id: Uuid,
    cycle: ExecutionCycle,
    actions: ImmediateActionHandler,
    settings_provider: Option<Arc<dyn SettingsProvider>>,
    settings: Mutex<DaemonSettings>,
    poller: Poller,
    tick_lock: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct Daemon {
    inner: Arc<DaemonInner>,
}

impl Daemon {
    pub fn new(
        cycle: ExecutionCycle,
        actions: ImmediateActionHandler,
        settings: DaemonSettings,
        settings_provider: Option<Arc<dyn SettingsProvider>>,
    ) -> Self {
        let poller = Poller::new(settings.poll_interval);
        let daemon = Self {
            inner: Arc::new(DaemonInner {
                instance_id: Uuid::new_v4(),
                cycle,
                actions,
                settings_provider,
                settings: Mutex::new(settings.clone()),
                poller,
                tick_lock: tokio::sync::Mutex::new(()),
            }),
        };
        daemon.apply_settings(None, &settings);
        daemon
    }

    /// Wires the cycle, handler and settings from config plus collaborators.
    pub fn from_services(cfg: &AppConfig, services: Services) -> Self {
        let audit = match cfg.audit.directory.as_deref() {
            Some(dir) if cfg.audit.enabled && !dir.trim().is_empty() => AuditLogger::new(dir),
            _ => AuditLogger::disabled(),
        };
        let worker = SubprocessWorker::new(services.runner, DEFAULT_COMMAND_TEMPLATE)
            .with_stop_grace(Duration::from_millis(cfg.daemon.stop_grace_ms))
            .with_output_cap(cfg.audit.output_cap);
        let settings = DaemonSettings::from_config(cfg);

        let cycle = ExecutionCycle::new(
            services.queue.clone(),
            worker,
            CycleOptions {
                max_parallel: cfg.daemon.max_parallel_tasks,
                templates: settings.worker_templates(),
                audit,
                stopped_reason: cfg.daemon.stopped_reason.clone(),
            },
        );
        let actions = ImmediateActionHandler::new(services.queue, cycle.registry().clone());
        let provider = if cfg.queue.refresh_settings {
            services.settings
        } else {
            None
        };
        Self::new(cycle, actions, settings, provider)
    }

    /// Random per-process id, recorded in daemon audit entries and tick spans.
    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    pub fn cycle(&self) -> &ExecutionCycle {
        &self.inner.cycle
    }

    pub fn settings(&self) -> DaemonSettings {
        self.inner
            .settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poller.interval()
    }

    fn apply_settings(&self, previous: Option<&DaemonSettings>, next: &DaemonSettings) {
        let cycle = &self.inner.cycle;
        cycle.set_max_parallel_tasks(next.max_parallel_tasks);
        self.inner.poller.set_interval(next.poll_interval);

        let command_changed = previous
            .map(|p| p.command_template != next.command_template)
            .unwrap_or(true);
        if command_changed {
            for warning in inspect_command_template(&next.command_template) {
                tracing::warn!(target: "taskpilot.daemon", "command template: {warning}");
            }
        }
        cycle.set_templates(next.worker_templates());
    }

    async fn refresh_settings(&self) -> anyhow::Result<bool> {
        let Some(provider) = self.inner.settings_provider.as_ref() else {
            return Ok(false);
        };
        let patch = provider.fetch_settings().await?;

        let (previous, next) = {
            let mut current = self
                .inner
                .settings
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let next = current.merged(&patch);
            if next == *current {
                return Ok(false);
            }
            let previous = std::mem::replace(&mut *current, next.clone());
            (previous, next)
        };
        self.apply_settings(Some(&previous), &next);
        tracing::debug!(target: "taskpilot.daemon", "settings updated");
        Ok(true)
    }

    /// One poll iteration. Ticks are serialized; a stage failure is logged
    /// and later stages still run.
    pub async fn tick(&self) -> TickReport {
        let span = tracing::info_span!("tick", daemon = %self.inner.instance_id);
        self.tick_inner().instrument(span).await
    }

    async fn tick_inner(&self) -> TickReport {
        let _guard = self.inner.tick_lock.lock().await;
        let mut report = TickReport::default();

        match self.refresh_settings().await {
            Ok(changed) => report.settings_refreshed = changed,
            Err(e) => tracing::warn!(
                target: "taskpilot.daemon",
                error = %format!("{e:#}"),
                "settings refresh failed, keeping previous settings"
            ),
        }

        match self.inner.actions.handle_pending().await {
            Ok(actions) => {
                if actions.acknowledged > 0 {
                    tracing::info!(
                        target: "taskpilot.daemon",
                        acknowledged = actions.acknowledged,
                        stopped = actions.stopped,
                        "immediate actions handled"
                    );
                }
                report.actions = Some(actions);
            }
            Err(e) => {
                tracing::error!(target: "taskpilot.daemon", error = %e, "immediate action handling failed")
            }
        }

        match self.inner.cycle.run_cycle().await {
            Ok(cycle) => report.cycle = Some(cycle),
            Err(e) => tracing::error!(target: "taskpilot.daemon", error = %e, "execution cycle failed"),
        }

        report
    }

    /// Starts the poller. Returns `false` when already running.
    pub async fn start(&self) -> bool {
        let daemon = self.clone();
        let started = self.inner.poller.start(move || {
            let daemon = daemon.clone();
            async move {
                daemon.tick().await;
            }
        });
        if started {
            let settings = self.settings();
            tracing::info!(
                target: "taskpilot.daemon",
                instance_id = %self.inner.instance_id,
                max_parallel = self.inner.cycle.max_parallel_tasks(),
                poll_interval_ms = settings.poll_interval.as_millis() as u64,
                "daemon started"
            );
            self.inner
                .cycle
                .audit()
                .daemon()
                .log(
                    AuditStatus::Meta,
                    "Daemon started",
                    Some(&json!({
                        "instanceId": self.inner.instance_id.to_string(),
                        "maxParallelTasks": self.inner.cycle.max_parallel_tasks(),
                        "pollIntervalMs": settings.poll_interval.as_millis() as u64,
                    })),
                )
                .await;
        }
        started
    }

    pub fn is_running(&self) -> bool {
        self.inner.poller.is_running()
    }

    /// Stops polling, then waits for every in-flight task to settle.
    pub async fn shutdown(&self) {
        let was_running = self.inner.poller.stop().await;
        let in_flight = self.inner.cycle.registry().len();
        if in_flight > 0 {
            tracing::info!(target: "taskpilot.daemon", in_flight, "waiting for running tasks");
        }
        self.inner.cycle.drain().await;
        if was_running {
            self.inner
                .cycle
                .audit()
                .daemon()
                .log(
                    AuditStatus::Meta,
                    "Daemon stopped",
                    Some(&json!({ "instanceId": self.inner.instance_id.to_string() })),
                )
                .await;
            tracing::info!(target: "taskpilot.daemon", "daemon stopped");
        }
    }

    /// A single tick followed by a drain.
    pub async fn run_once(&self) -> TickReport {
        let report = self.tick().await;
        self.inner.cycle.drain().await;
        report
    }
}
