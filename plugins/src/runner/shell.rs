use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use taskpilot_core::api::{CommandOutput, CommandRequest, CommandRunner};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Runs rendered command lines through the platform shell.
pub struct ShellCommandRunner {
    shell: String,
    flag: String,
}

impl ShellCommandRunner {
    pub fn new(shell: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            flag: flag.into(),
        }
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        if cfg!(windows) {
            Self::new("cmd", "/C")
        } else {
            Self::new("sh", "-c")
        }
    }
}

async fn read_lossy<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        tracing::debug!(target: "taskpilot.runner", error = %e, "output stream closed early");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    // The child leads its own process group, so this reaches its descendants too.
    unsafe {
        libc::kill(-(pid as libc::pid_t), signal);
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        signal_group(pid, libc::SIGTERM);
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            return status;
        }
        tracing::warn!(target: "taskpilot.runner", pid, "process ignored SIGTERM, killing");
        signal_group(pid, libc::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.start_kill() {
        tracing::debug!(target: "taskpilot.runner", error = %e, "kill after exit");
    }
    child.wait().await
}

fn exit_signal(status: &ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    fn name(&self) -> &str {
        "shell"
    }

    async fn run(
        &self,
        request: &CommandRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<CommandOutput> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.flag)
            .arg(&request.command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {} for task {}", self.shell, request.task_id))?;
        tracing::debug!(
            target: "taskpilot.runner",
            task_id = %request.task_id,
            pid = child.id(),
            "process spawned"
        );

        let stdout = tokio::spawn(read_lossy(child.stdout.take()));
        let stderr = tokio::spawn(read_lossy(child.stderr.take()));

        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                tracing::info!(
                    target: "taskpilot.runner",
                    task_id = %request.task_id,
                    grace_ms = request.stop_grace.as_millis() as u64,
                    "cancelling process"
                );
                terminate(&mut child, request.stop_grace).await
            }
        }
        .with_context(|| format!("failed to wait for task {}", request.task_id))?;

        Ok(CommandOutput {
            exit_code: status.code(),
            signal: exit_signal(&status),
            stdout: stdout.await.unwrap_or_default(),
            stderr: stderr.await.unwrap_or_default(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Instant;

    fn request(cmd: &str, grace_ms: u64) -> CommandRequest {
        CommandRequest {
            task_id: "t".into(),
            command_line: cmd.into(),
            stop_grace: Duration::from_millis(grace_ms),
        }
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let out = ShellCommandRunner::default()
            .run(&request("echo hello; echo oops >&2; exit 3", 100), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.signal, None);
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
    }

    #[tokio::test]
    async fn cancellation_sends_sigterm() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let out = ShellCommandRunner::default()
            .run(&request("sleep 30", 5_000), cancel)
            .await
            .unwrap();
        assert_eq!(out.exit_code, None);
        assert_eq!(out.signal, Some(libc::SIGTERM));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn ignored_sigterm_escalates_to_sigkill() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });
        let out = ShellCommandRunner::default()
            .run(&request("trap '' TERM; sleep 30", 200), cancel)
            .await
            .unwrap();
        assert_eq!(out.signal, Some(libc::SIGKILL));
    }

    #[tokio::test]
    async fn missing_shell_is_an_error() {
        let err = ShellCommandRunner::new("/nonexistent/shell", "-c")
            .run(&request("true", 10), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to spawn"));
    }
}
