use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// `~/.taskpilot`
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".taskpilot"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    let data_dir = get_data_dir()?;
    let user_config = data_dir.join("config.toml");
    let local_config = Path::new("config.toml");

    let mut cfg = if user_config.exists() {
        parse_file(&user_config)?
    } else if local_config.exists() {
        parse_file(local_config)?
    } else {
        AppConfig::default()
    };

    finish(&mut cfg, &data_dir)?;
    Ok(cfg)
}

/// Loads an explicit file; a missing file is an error.
pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let mut cfg = parse_file(path.as_ref())?;
    finish(&mut cfg, &get_data_dir()?)?;
    Ok(cfg)
}

fn parse_file(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))
}

fn finish(cfg: &mut AppConfig, data_dir: &Path) -> anyhow::Result<()> {
    resolve_dirs(cfg, data_dir);
    apply_env_overrides(cfg, |key| std::env::var(key).ok())
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_ref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

pub(crate) fn resolve_dirs(cfg: &mut AppConfig, data_dir: &Path) {
    if is_blank(&cfg.logging.directory) {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }
    if is_blank(&cfg.audit.directory) {
        cfg.audit.directory = Some(data_dir.join("audit").to_string_lossy().to_string());
    }
}

pub(crate) fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("TASKPILOT_QUEUE_URL") {
        cfg.queue.base_url = v;
    }
    if let Some(v) = get("TASKPILOT_QUEUE_API_KEY") {
        cfg.queue.api_key = v;
    }
    if let Some(v) = get("TASKPILOT_MAX_PARALLEL") {
        cfg.daemon.max_parallel_tasks = v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("TASKPILOT_MAX_PARALLEL must be an integer, got {v:?}"))?;
    }
    if let Some(v) = get("TASKPILOT_POLL_INTERVAL_MS") {
        cfg.daemon.poll_interval_ms = v.trim().parse().map_err(|_| {
            anyhow::anyhow!("TASKPILOT_POLL_INTERVAL_MS must be an integer, got {v:?}")
        })?;
    }
    if let Some(v) = get("TASKPILOT_AUDIT_DIR") {
        cfg.audit.directory = Some(v);
    }
    Ok(())
}
