use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Fixed-delay timer driving an async callback.
///
/// The first tick fires immediately. Ticks never overlap: the next delay
/// starts only after the previous callback has returned.
#[derive(Clone)]
pub struct Poller {
    interval_ms: Arc<AtomicU64>,
    running: Arc<Mutex<Option<Running>>>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: Arc::new(AtomicU64::new(clamp_ms(interval))),
            running: Arc::new(Mutex::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    /// Applies from the next delay on.
    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms.store(clamp_ms(interval), Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Returns `false` without effect when already running.
    pub fn start<F, Fut>(&self, mut on_tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval_ms = self.interval_ms.clone();
        let handle = tokio::spawn(async move {
            loop {
                if token.is_cancelled() {
                    break;
                }
                on_tick().await;
                let delay = Duration::from_millis(interval_ms.load(Ordering::Relaxed));
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        });
        *running = Some(Running { cancel, handle });
        true
    }

    /// Stops future ticks and waits for an in-progress tick to finish.
    /// Returns `false` when the poller was not running.
    pub async fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(running) = running else {
            return false;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::warn!(target: "taskpilot.poller", error = %e, "poll loop ended abnormally");
        }
        true
    }
}

fn clamp_ms(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1)
}
