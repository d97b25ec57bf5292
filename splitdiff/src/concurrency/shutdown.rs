use tokio::sync::watch;
use tracing::info;

use crate::bail;
use crate::concurrency::signal::{SignalRx, SignalTx, create_signal};
use crate::error::{ErrorKind, SplitDiffResult};

/// Sending half of the cancellation signal of a worker run.
#[derive(Debug, Clone)]
pub struct ShutdownTx(SignalTx);

impl ShutdownTx {
    pub fn wrap(tx: SignalTx) -> Self {
        Self(tx)
    }

    /// Requests cancellation of every run subscribed to this signal.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

pub type ShutdownRx = SignalRx;

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = create_signal();
    (ShutdownTx::wrap(tx), rx)
}

/// Returns `true` once cancellation has been requested on `shutdown_rx`.
///
/// A dropped sender is not a cancellation request.
pub fn is_shutdown_requested(shutdown_rx: &ShutdownRx) -> bool {
    shutdown_rx.has_changed().unwrap_or(false)
}

/// Fails with [`ErrorKind::WorkerCancelled`] if cancellation has been requested.
///
/// Polled between phases of a run, never inside one.
pub fn check_done(shutdown_rx: &ShutdownRx) -> SplitDiffResult<()> {
    if is_shutdown_requested(shutdown_rx) {
        info!("cancellation requested, skipping the remaining phases");

        bail!(ErrorKind::WorkerCancelled, "The worker run was cancelled");
    }

    Ok(())
}
