use thiserror::Error;

use super::render::RenderError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("daemon failed: {0}")]
    Daemon(#[from] DaemonError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(String),
    #[error("queue collaborator error: {0}")]
    Queue(#[source] anyhow::Error),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task join error: {0}")]
    Join(String),
}

impl DaemonError {
    pub fn queue(err: anyhow::Error) -> Self {
        Self::Queue(err)
    }
}
