//! Graceful shutdown on signals or an explicit request

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Resolves on SIGTERM, SIGINT, or a call to `trigger` (tray "Exit")
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown from inside the daemon
    pub fn trigger(&self) {
        debug!("shutdown requested");
        self.requested.notify_one();
    }

    /// Wait for a shutdown signal or request
    pub async fn wait(&self) {
        let sigterm = signal(SignalKind::terminate());
        let sigint = signal(SignalKind::interrupt());

        let (mut sigterm, mut sigint) = match (sigterm, sigint) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!(%e, "failed to register signal handlers, waiting for explicit shutdown only");
                self.requested.notified().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
            _ = self.requested.notified() => {
                debug!("received shutdown request");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_trigger_resolves_wait() {
        let shutdown = ShutdownSignal::new();
        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
