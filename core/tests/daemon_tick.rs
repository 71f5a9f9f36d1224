mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{task, MockQueue, MockSettings, Script, StubRunner};
use pretty_assertions::assert_eq;
use taskpilot_core::api::{
    AppConfig, AppContext, Daemon, DaemonError, ImmediateActionKind, Services, ServicesFactory,
    SettingsPatch, SettingsProvider, TaskStatus,
};

fn services(queue: Arc<MockQueue>, runner: Arc<StubRunner>, settings: Option<Arc<MockSettings>>) -> Services {
    Services {
        queue,
        settings: settings.map(|s| s as Arc<dyn SettingsProvider>),
        runner,
    }
}

fn config(max_parallel: usize) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.daemon.max_parallel_tasks = max_parallel;
    cfg.audit.enabled = false;
    cfg
}

#[tokio::test]
async fn tick_applies_settings_before_the_cycle() {
    let queue = MockQueue::new(vec![
        task("a", Some("1"), None),
        task("b", Some("2"), None),
        task("c", Some("3"), None),
    ]);
    let settings = Arc::new(MockSettings::default());
    settings.set(SettingsPatch {
        max_parallel_tasks: Some(3.7),
        poll_interval_ms: Some(250),
        ..SettingsPatch::default()
    });
    let daemon = Daemon::from_services(
        &config(1),
        services(queue.clone(), StubRunner::new(), Some(settings)),
    );

    let report = daemon.run_once().await;
    assert!(report.settings_refreshed);
    assert_eq!(report.cycle.unwrap().started.len(), 3);
    assert_eq!(daemon.cycle().max_parallel_tasks(), 3);
    assert_eq!(daemon.poll_interval(), Duration::from_millis(250));
    assert_eq!(queue.terminal_reports_for("c")[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn settings_failure_keeps_previous_values() {
    let queue = MockQueue::new(vec![task("a", None, None)]);
    let daemon = Daemon::from_services(
        &config(2),
        services(queue, StubRunner::new(), Some(Arc::new(MockSettings::default()))),
    );
    let report = daemon.run_once().await;
    assert!(!report.settings_refreshed);
    assert_eq!(daemon.cycle().max_parallel_tasks(), 2);
    assert_eq!(report.cycle.unwrap().started.len(), 1);
}

#[tokio::test]
async fn actions_run_before_new_work_is_claimed() {
    let queue = MockQueue::new(vec![task("slow", Some("p"), None)]);
    let runner = StubRunner::new();
    runner.script("slow", Script::UntilCancelled);
    let daemon = Daemon::from_services(&config(1), services(queue.clone(), runner, None));

    daemon.tick().await;
    queue.push_task(task("next", Some("p"), None));
    queue.push_action("x", "slow", ImmediateActionKind::ForceStop);

    let report = daemon.tick().await;
    assert_eq!(report.actions.unwrap().stopped, 1);
    assert_eq!(report.cycle.unwrap().started, vec!["next".to_string()]);
    daemon.shutdown().await;

    assert_eq!(queue.terminal_reports_for("slow")[0].status, TaskStatus::Stopped);
    assert_eq!(queue.terminal_reports_for("next")[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn cycle_error_does_not_abort_the_tick() {
    let queue = MockQueue::new(vec![task("a", None, None)]);
    queue.fail_fetch(true);
    queue.push_action("act", "missing", ImmediateActionKind::ForceStop);
    let daemon = Daemon::from_services(&config(1), services(queue.clone(), StubRunner::new(), None));

    let report = daemon.tick().await;
    assert!(report.cycle.is_none());
    assert_eq!(report.actions.unwrap().acknowledged, 1);
}

#[tokio::test]
async fn start_and_shutdown_are_idempotent() {
    let queue = MockQueue::new(vec![task("a", None, None)]);
    let mut cfg = config(1);
    cfg.daemon.poll_interval_ms = 20;
    let daemon = Daemon::from_services(&cfg, services(queue.clone(), StubRunner::new(), None));

    assert!(daemon.start().await);
    assert!(!daemon.start().await);
    assert!(daemon.is_running());

    let mut waited = 0;
    while queue.terminal_reports_for("a").is_empty() && waited < 200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }
    daemon.shutdown().await;
    daemon.shutdown().await;
    assert!(!daemon.is_running());
    assert_eq!(queue.terminal_reports_for("a").len(), 1);
}

struct FixedFactory {
    queue: Arc<MockQueue>,
    runner: Arc<StubRunner>,
}

#[async_trait::async_trait]
impl ServicesFactory for FixedFactory {
    async fn build_services(&self, _cfg: &AppConfig) -> Result<Services, DaemonError> {
        Ok(services(self.queue.clone(), self.runner.clone(), None))
    }
}

#[tokio::test]
async fn context_builds_a_daemon_from_its_factory() {
    let queue = MockQueue::new(vec![task("ctx", None, None)]);
    let factory = Arc::new(FixedFactory {
        queue: queue.clone(),
        runner: StubRunner::new(),
    });
    let ctx = AppContext::new(config(1), Some(factory));
    let daemon = ctx.build_daemon().await.unwrap();
    daemon.run_once().await;
    assert_eq!(queue.terminal_reports_for("ctx").len(), 1);

    let bare = AppContext::new(config(1), None);
    assert!(matches!(bare.build_daemon().await, Err(DaemonError::Config(_))));
}
