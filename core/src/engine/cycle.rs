use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use futures::FutureExt;

use crate::audit::{AuditLogger, AuditStatus};
use crate::error::DaemonError;
use crate::queue::TaskQueue;
use crate::report::StatusReporter;
use crate::scheduler::{select_parallel, CapacityScheduler};
use crate::task::{scope_key, Task, TaskExecutionResult};
use crate::worker::{SubprocessWorker, WorkerContext, WorkerTemplates};

use super::control::RunningTaskControl;
use super::registry::InFlightRegistry;

pub const DEFAULT_STOPPED_REASON: &str = "Task was force-stopped by an operator";

/// Counts returned by one poll iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub slots_requested: usize,
    pub started: Vec<String>,
}

impl CycleReport {
    pub fn started_count(&self) -> usize {
        self.started.len()
    }
}

/// State shared between the cycle, its units of work and every
/// `RunningTaskControl`.
pub(crate) struct CycleRuntime {
    pub(crate) scheduler: Mutex<CapacityScheduler>,
    pub(crate) registry: InFlightRegistry,
    pub(crate) reporter: StatusReporter,
    pub(crate) audit: AuditLogger,
    pub(crate) stopped_reason: String,
}

impl CycleRuntime {
    pub(crate) fn scheduler(&self) -> MutexGuard<'_, CapacityScheduler> {
        self.scheduler.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drops the registry entry and frees the slot, but only while the entry
    /// still belongs to `control`.
    pub(crate) fn release(&self, control: &RunningTaskControl) {
        let id = control.task_id();
        if self.registry.unregister_if(id, control) {
            self.scheduler().finish_task(id);
        }
    }
}

pub struct CycleOptions {
    pub max_parallel: usize,
    pub templates: WorkerTemplates,
    pub audit: AuditLogger,
    pub stopped_reason: String,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            templates: WorkerTemplates::default(),
            audit: AuditLogger::disabled(),
            stopped_reason: DEFAULT_STOPPED_REASON.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ExecutionCycle {
    runtime: Arc<CycleRuntime>,
    queue: Arc<dyn TaskQueue>,
    worker: Arc<SubprocessWorker>,
    templates: Arc<RwLock<WorkerTemplates>>,
}

impl ExecutionCycle {
    pub fn new(queue: Arc<dyn TaskQueue>, worker: SubprocessWorker, opts: CycleOptions) -> Self {
        let runtime = CycleRuntime {
            scheduler: Mutex::new(CapacityScheduler::new(opts.max_parallel)),
            registry: InFlightRegistry::new(),
            reporter: StatusReporter::new(queue.clone()),
            audit: opts.audit,
            stopped_reason: opts.stopped_reason,
        };
        Self {
            runtime: Arc::new(runtime),
            queue,
            worker: Arc::new(worker),
            templates: Arc::new(RwLock::new(opts.templates)),
        }
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.runtime.registry
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.runtime.audit
    }

    pub fn available_slots(&self) -> usize {
        self.runtime.scheduler().available_slots()
    }

    pub fn active_count(&self) -> usize {
        self.runtime.scheduler().active_count()
    }

    pub fn max_parallel_tasks(&self) -> usize {
        self.runtime.scheduler().max_parallel_tasks()
    }

    pub fn set_max_parallel_tasks(&self, n: f64) {
        let mut scheduler = self.runtime.scheduler();
        let before = scheduler.max_parallel_tasks();
        scheduler.set_max_parallel_tasks(n);
        let after = scheduler.max_parallel_tasks();
        if before != after {
            tracing::info!(target: "taskpilot.cycle", from = before, to = after, "max parallel tasks updated");
        }
    }

    pub fn templates(&self) -> WorkerTemplates {
        self.templates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Takes effect for units of work dispatched after the call.
    pub fn set_templates(&self, templates: WorkerTemplates) {
        *self.templates.write().unwrap_or_else(|e| e.into_inner()) = templates;
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, DaemonError> {
        let slots = self.available_slots();
        let mut report = CycleReport {
            slots_requested: slots,
            ..CycleReport::default()
        };
        if slots < 1 {
            tracing::debug!(target: "taskpilot.cycle", "waiting: no free slots");
            return Ok(report);
        }

        let fetched = self
            .queue
            .fetch_next_tasks(slots)
            .await
            .map_err(DaemonError::queue)?;
        report.fetched = fetched.len();
        if fetched.is_empty() {
            tracing::debug!(target: "taskpilot.cycle", "waiting: queue is empty");
            return Ok(report);
        }

        let active_scopes = self.runtime.registry.active_scopes();
        let selected = select_parallel(&fetched, slots, &active_scopes);

        let reserved: Vec<Task> = {
            let mut scheduler = self.runtime.scheduler();
            selected
                .into_iter()
                .filter(|t| scheduler.start_task(&t.id))
                .collect()
        };
        if reserved.is_empty() {
            tracing::debug!(
                target: "taskpilot.cycle",
                fetched = report.fetched,
                "waiting: no fetched task could be reserved"
            );
            return Ok(report);
        }

        let ids: Vec<String> = reserved.iter().map(|t| t.id.clone()).collect();
        if let Err(e) = self.queue.mark_tasks_in_progress(&ids).await {
            let mut scheduler = self.runtime.scheduler();
            for id in &ids {
                scheduler.finish_task(id);
            }
            return Err(DaemonError::queue(e));
        }

        let templates = self.templates();
        for task in reserved {
            report.started.push(task.id.clone());
            self.dispatch(task, templates.clone());
        }

        tracing::info!(
            target: "taskpilot.cycle",
            started = report.started.len(),
            fetched = report.fetched,
            "started {} of {} fetched",
            report.started.len(),
            report.fetched
        );
        Ok(report)
    }

    fn dispatch(&self, task: Task, templates: WorkerTemplates) {
        let control = Arc::new(RunningTaskControl::new(
            task.id.clone(),
            Arc::downgrade(&self.runtime),
        ));
        let task_id = task.id.clone();
        self.runtime
            .registry
            .register(control.clone(), scope_key(&task));

        let runtime = self.runtime.clone();
        let worker = self.worker.clone();
        let handle = tokio::spawn(async move {
            run_unit(&runtime, &worker, &task, &templates, &control).await;
            runtime.release(&control);
        });
        self.runtime.registry.attach_handle(&task_id, handle);
    }

    /// Waits for every dispatched unit of work to finish, including units
    /// already force-stopped whose process is still terminating. Running
    /// tasks are not cancelled.
    pub async fn drain(&self) {
        loop {
            let handles = self.runtime.registry.take_handles();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(target: "taskpilot.cycle", error = %e, "unit of work ended abnormally");
                }
            }
        }
    }
}

async fn run_unit(
    runtime: &CycleRuntime,
    worker: &SubprocessWorker,
    task: &Task,
    templates: &WorkerTemplates,
    control: &RunningTaskControl,
) {
    let audit = runtime.audit.for_task(&task.id);
    let ctx = WorkerContext {
        cancel: control.cancel_token(),
        audit: &audit,
    };

    let outcome = AssertUnwindSafe(worker.execute(task, templates, ctx))
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(render_err)) => {
            audit
                .log(AuditStatus::Failure, &render_err.to_string(), None)
                .await;
            TaskExecutionResult::failed(render_err.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            audit
                .log(AuditStatus::Failure, &format!("worker panicked: {message}"), None)
                .await;
            TaskExecutionResult::failed(message)
        }
    };

    if !control.try_complete() {
        return;
    }

    match runtime.reporter.report_result(&task.id, &result).await {
        Ok(()) => tracing::info!(
            target: "taskpilot.cycle",
            task_id = %task.id,
            status = %result.status(),
            "task settled"
        ),
        Err(e) => tracing::error!(
            target: "taskpilot.cycle",
            task_id = %task.id,
            status = %result.status(),
            error = %e,
            "failed to report task status"
        ),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit of work panicked".to_string()
    }
}
