#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use taskpilot_core::api::{
    CommandOutput, CommandRequest, CommandRunner, CycleOptions, ExecutionCycle, ImmediateAction,
    ImmediateActionKind, SettingsPatch, SettingsProvider, StatusReport, SubprocessWorker, Task,
    TaskQueue, TaskStatus, DEFAULT_COMMAND_TEMPLATE,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub fn task(id: &str, project: Option<&str>, subproject: Option<&str>) -> Task {
    Task {
        id: id.to_string(),
        text: format!("do {id}"),
        context: "/tmp/work".to_string(),
        model: "gpt-test".to_string(),
        reasoning: "low".to_string(),
        project_id: project.map(str::to_string),
        subproject_id: subproject.map(str::to_string),
        ..Default::default()
    }
}

#[derive(Default)]
struct QueueState {
    pending: Vec<Task>,
    in_progress: Vec<Vec<String>>,
    actions: Vec<ImmediateAction>,
    acknowledged: Vec<String>,
    completed: Vec<String>,
    reports: Vec<StatusReport>,
    fail_mark: bool,
    fail_fetch: bool,
}

/// In-memory queue: `fetch_next_tasks` peeks, `mark_tasks_in_progress` claims.
#[derive(Default)]
pub struct MockQueue {
    state: Mutex<QueueState>,
}

impl MockQueue {
    pub fn new(tasks: Vec<Task>) -> Arc<Self> {
        let q = Self::default();
        q.state.lock().unwrap().pending = tasks;
        Arc::new(q)
    }

    pub fn push_task(&self, task: Task) {
        self.state.lock().unwrap().pending.push(task);
    }

    pub fn push_action(&self, id: &str, task_id: &str, kind: ImmediateActionKind) {
        self.state.lock().unwrap().actions.push(ImmediateAction {
            id: id.to_string(),
            task_id: task_id.to_string(),
            kind,
        });
    }

    pub fn fail_mark(&self, fail: bool) {
        self.state.lock().unwrap().fail_mark = fail;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().pending.iter().map(|t| t.id.clone()).collect()
    }

    pub fn in_progress_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().in_progress.clone()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.state.lock().unwrap().acknowledged.clone()
    }

    pub fn completed(&self) -> Vec<String> {
        self.state.lock().unwrap().completed.clone()
    }

    pub fn reports(&self) -> Vec<StatusReport> {
        self.state.lock().unwrap().reports.clone()
    }

    pub fn reports_for(&self, task_id: &str) -> Vec<StatusReport> {
        self.reports()
            .into_iter()
            .filter(|r| r.task_id == task_id)
            .collect()
    }

    pub fn terminal_reports_for(&self, task_id: &str) -> Vec<StatusReport> {
        self.reports_for(task_id)
            .into_iter()
            .filter(|r| r.status != TaskStatus::InProgress)
            .collect()
    }
}

#[async_trait]
impl TaskQueue for MockQueue {
    async fn fetch_next_tasks(&self, limit: usize) -> anyhow::Result<Vec<Task>> {
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            anyhow::bail!("queue unavailable");
        }
        Ok(state.pending.iter().take(limit).cloned().collect())
    }

    async fn mark_tasks_in_progress(&self, ids: &[String]) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_mark {
            anyhow::bail!("mark failed");
        }
        state.pending.retain(|t| !ids.contains(&t.id));
        state.in_progress.push(ids.to_vec());
        Ok(())
    }

    async fn fetch_immediate_actions(&self) -> anyhow::Result<Vec<ImmediateAction>> {
        Ok(std::mem::take(&mut self.state.lock().unwrap().actions))
    }

    async fn acknowledge_immediate_action(&self, id: &str) -> anyhow::Result<()> {
        self.state.lock().unwrap().acknowledged.push(id.to_string());
        Ok(())
    }

    async fn complete_immediate_action(&self, id: &str) -> anyhow::Result<()> {
        self.state.lock().unwrap().completed.push(id.to_string());
        Ok(())
    }

    async fn report_task_status(&self, report: &StatusReport) -> anyhow::Result<()> {
        self.state.lock().unwrap().reports.push(report.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSettings {
    patch: Mutex<Option<SettingsPatch>>,
}

impl MockSettings {
    pub fn set(&self, patch: SettingsPatch) {
        *self.patch.lock().unwrap() = Some(patch);
    }
}

#[async_trait]
impl SettingsProvider for MockSettings {
    async fn fetch_settings(&self) -> anyhow::Result<SettingsPatch> {
        match self.patch.lock().unwrap().clone() {
            Some(p) => Ok(p),
            None => anyhow::bail!("settings unavailable"),
        }
    }
}

#[derive(Clone)]
pub enum Script {
    Output(CommandOutput),
    /// Blocks until the notify fires, then returns the output.
    Gate(Arc<Notify>, CommandOutput),
    /// Blocks until the notify fires, ignoring cancellation.
    Stubborn(Arc<Notify>, CommandOutput),
    /// Blocks until cancelled, then reports termination by SIGTERM.
    UntilCancelled,
    Error(String),
    Panic(String),
}

/// Runner scripted per task id; unscripted tasks print "ok" and exit 0.
#[derive(Default)]
pub struct StubRunner {
    scripts: Mutex<HashMap<String, Script>>,
    commands: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl StubRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, task_id: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), script);
    }

    pub fn gate(&self, task_id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script(
            task_id,
            Script::Gate(notify.clone(), CommandOutput::success(format!("{task_id} ok"))),
        );
        notify
    }

    /// Like `gate`, but the process keeps running after cancellation and
    /// still exits 0 once released.
    pub fn stubborn_gate(&self, task_id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script(
            task_id,
            Script::Stubborn(notify.clone(), CommandOutput::success("ok")),
        );
        notify
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    fn name(&self) -> &str {
        "stub"
    }

    async fn run(
        &self,
        request: &CommandRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<CommandOutput> {
        self.commands
            .lock()
            .unwrap()
            .push(request.command_line.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.task_id)
            .cloned()
            .unwrap_or_else(|| Script::Output(CommandOutput::success("ok")));

        match script {
            Script::Output(out) => Ok(out),
            Script::Gate(notify, out) => {
                tokio::select! {
                    _ = notify.notified() => Ok(out),
                    _ = cancel.cancelled() => Ok(terminated()),
                }
            }
            Script::Stubborn(notify, out) => {
                notify.notified().await;
                Ok(out)
            }
            Script::UntilCancelled => {
                cancel.cancelled().await;
                Ok(terminated())
            }
            Script::Error(msg) => Err(anyhow::anyhow!(msg)),
            Script::Panic(msg) => panic!("{msg}"),
        }
    }
}

fn terminated() -> CommandOutput {
    CommandOutput {
        exit_code: None,
        signal: Some(15),
        stdout: String::new(),
        stderr: String::new(),
    }
}

pub fn cycle(queue: Arc<MockQueue>, runner: Arc<StubRunner>, max_parallel: usize) -> ExecutionCycle {
    let worker = SubprocessWorker::new(runner, DEFAULT_COMMAND_TEMPLATE);
    ExecutionCycle::new(
        queue,
        worker,
        CycleOptions {
            max_parallel,
            ..CycleOptions::default()
        },
    )
}
