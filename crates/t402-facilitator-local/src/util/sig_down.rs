//! Shutdown signal handling.
//!
//! [`SigDown`] turns SIGTERM or SIGINT into a cancelled [`CancellationToken`].
//! Hand the token to [`FacilitatorLocal::with_shutdown`](crate::FacilitatorLocal::with_shutdown):
//! settlements waiting for confirmation then return `settlement_cancelled` with their
//! transaction reference instead of being dropped mid-flight.

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Installs the signal handlers. Must run inside a tokio runtime.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();
        let task_tracker = TaskTracker::new();
        task_tracker.spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = token.cancelled() => return,
            };
            tracing::info!(signal = name, "Shutdown requested");
            token.cancel();
        });
        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Cancels without waiting for a signal.
    pub fn trigger(&self) {
        self.cancellation_token.cancel();
    }

    /// Resolves once shutdown was requested and the listener task has exited.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}
