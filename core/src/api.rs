//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `taskpilot_core::api` instead of reaching into internal modules.

pub use crate::actions::{ActionReport, ImmediateActionHandler};
pub use crate::audit::{AuditLogger, AuditStatus, TaskAudit};
pub use crate::config::{
    get_data_dir, load_default, load_from_path, AppConfig, AuditConfig, DaemonConfig,
    LoggingConfig, QueueConfig, TemplatesConfig,
};
pub use crate::context::{AppContext, Services, ServicesFactory};
pub use crate::daemon::{Daemon, DaemonSettings, TickReport};
pub use crate::engine::{
    CycleOptions, CycleReport, ExecutionCycle, InFlightRegistry, Poller, RunningTaskControl,
    DEFAULT_STOPPED_REASON,
};
pub use crate::error::{CliError, DaemonError, RenderError};
pub use crate::queue::{SettingsPatch, SettingsProvider, StatusReport, TaskQueue};
pub use crate::report::{idempotency_key, StatusReporter};
pub use crate::runner::{signal_name, CommandOutput, CommandRequest, CommandRunner};
pub use crate::scheduler::{select_parallel, sort_by_priority, CapacityScheduler};
pub use crate::task::serde_utils::{read_task_json_file, task_from_json};
pub use crate::task::{
    scope_key, ImmediateAction, ImmediateActionKind, Task, TaskExecutionResult, TaskOutcome,
    TaskStatus,
};
pub use crate::template::{
    inspect_command_template, normalize_command_template, render, render_command,
    PromptTemplates, TemplateVariant, DEFAULT_COMMAND_TEMPLATE,
};
pub use crate::worker::{SubprocessWorker, WorkerContext, WorkerTemplates};
