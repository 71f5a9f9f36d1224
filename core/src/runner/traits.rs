use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{CommandOutput, CommandRequest};

/// Spawns one external process per call and captures its output.
///
/// When `cancel` fires the implementation must ask the process to terminate,
/// wait at most `request.stop_grace`, then kill it, and still return whatever
/// output was captured. `Err` is reserved for failures to run the process at all.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    fn name(&self) -> &str;
    async fn run(
        &self,
        request: &CommandRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<CommandOutput>;
}
