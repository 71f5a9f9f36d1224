//! Subcommand implementations.
use std::sync::Arc;

use taskpilot_core::api::{
    inspect_command_template, normalize_command_template, read_task_json_file, render,
    render_command, AppConfig, AppContext, CliError, PromptTemplates, TickReport,
    DEFAULT_COMMAND_TEMPLATE,
};
use taskpilot_plugins::services::PluginServicesFactory;

use crate::commands::cli::{Args, CheckTemplateArgs, RenderArgs};

/// Flag overrides win over file and environment values.
pub fn apply_overrides(cfg: &mut AppConfig, args: &Args) {
    if let Some(url) = args.queue_url.as_deref().filter(|u| !u.trim().is_empty()) {
        cfg.queue.base_url = url.to_string();
    }
    if let Some(n) = args.max_parallel {
        cfg.daemon.max_parallel_tasks = n;
    }
}

fn context(cfg: AppConfig) -> AppContext {
    AppContext::new(cfg, Some(Arc::new(PluginServicesFactory)))
}

pub async fn run_daemon(cfg: AppConfig) -> Result<i32, CliError> {
    let daemon = context(cfg).build_daemon().await?;
    daemon.start().await;

    tokio::signal::ctrl_c().await?;
    tracing::info!(target: "taskpilot.cli", "interrupt received, shutting down");
    daemon.shutdown().await;
    Ok(0)
}

pub fn tick_summary(report: &TickReport) -> serde_json::Value {
    let (acknowledged, stopped) = report
        .actions
        .map(|a| (a.acknowledged, a.stopped))
        .unwrap_or_default();
    let (fetched, started) = report
        .cycle
        .as_ref()
        .map(|c| (c.fetched, c.started.clone()))
        .unwrap_or_default();
    serde_json::json!({
        "settingsRefreshed": report.settings_refreshed,
        "actionsAcknowledged": acknowledged,
        "tasksStopped": stopped,
        "fetched": fetched,
        "started": started,
        "cycleOk": report.cycle.is_some(),
    })
}

pub async fn run_once(cfg: AppConfig) -> Result<i32, CliError> {
    let daemon = context(cfg).build_daemon().await?;
    let report = daemon.run_once().await;
    println!("{}", tick_summary(&report));
    Ok(if report.cycle.is_some() { 0 } else { 30 })
}

pub fn render_task(cfg: &AppConfig, args: &RenderArgs) -> Result<String, CliError> {
    let task = read_task_json_file(&args.task)?;
    let prompts = PromptTemplates {
        default: cfg.templates.prompt_default.clone(),
        with_history: cfg.templates.prompt_with_history.clone(),
    };
    let message = render(&task, &prompts).map_err(|e| CliError::Command(e.to_string()))?;
    let template = if cfg.templates.command.trim().is_empty() {
        DEFAULT_COMMAND_TEMPLATE
    } else {
        cfg.templates.command.as_str()
    };
    let command = render_command(template, &task, &message);
    Ok(format!("# prompt\n{message}\n\n# command\n{command}"))
}

pub fn check_template(cfg: &AppConfig, args: &CheckTemplateArgs) -> (String, Vec<String>) {
    let raw = args
        .command
        .clone()
        .unwrap_or_else(|| cfg.templates.command.clone());
    (normalize_command_template(&raw), inspect_command_template(&raw))
}
