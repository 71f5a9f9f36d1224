use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_STOPPED_REASON;
use crate::template::{DEFAULT_COMMAND_TEMPLATE, DEFAULT_PROMPT_TEMPLATE, HISTORY_PROMPT_TEMPLATE};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_true")]
    pub console: bool,

    /// If true, log to `taskpilot.log` under `directory`.
    #[serde(default = "default_true")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "taskpilot.cycle=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Empty or unset resolves to `~/.taskpilot/logs`.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console: true,
            file: true,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay between SIGTERM and SIGKILL when a task is cancelled.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Response text reported with a `stopped` status.
    #[serde(default = "default_stopped_reason")]
    pub stopped_reason: String,
}

fn default_max_parallel_tasks() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_stop_grace_ms() -> u64 {
    5_000
}

fn default_stopped_reason() -> String {
    DEFAULT_STOPPED_REASON.to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel_tasks(),
            poll_interval_ms: default_poll_interval_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            stopped_reason: default_stopped_reason(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default = "default_prompt")]
    pub prompt_default: String,

    #[serde(default = "default_prompt_with_history")]
    pub prompt_with_history: String,
}

fn default_command() -> String {
    DEFAULT_COMMAND_TEMPLATE.to_string()
}

fn default_prompt() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

fn default_prompt_with_history() -> String {
    HISTORY_PROMPT_TEMPLATE.to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            prompt_default: default_prompt(),
            prompt_with_history: default_prompt_with_history(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Empty or unset resolves to `~/.taskpilot/audit`.
    #[serde(default)]
    pub directory: Option<String>,

    /// Characters of process output kept in the `output` audit entry.
    #[serde(default = "default_output_cap")]
    pub output_cap: usize,
}

fn default_output_cap() -> usize {
    4_000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            output_cap: default_output_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as a bearer token when non-empty.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Poll the settings endpoint on every tick.
    #[serde(default = "default_true")]
    pub refresh_settings: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_ms: default_timeout_ms(),
            refresh_settings: true,
        }
    }
}
