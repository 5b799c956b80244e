//! Process shutdown signals
//!
//! Listeners are registered when [`ShutdownSignal::install`] runs, not when
//! the first `recv` is polled. A SIGINT or SIGTERM that arrives in between is
//! held for the next `recv` instead of killing the process outright.

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Registered SIGINT/SIGTERM listeners (Ctrl-C elsewhere)
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Option<Signal>,
    #[cfg(unix)]
    terminate: Option<Signal>,
}

impl ShutdownSignal {
    /// Register the listeners now. Must be called inside the runtime.
    pub fn install() -> Self {
        #[cfg(unix)]
        {
            Self {
                interrupt: listen(SignalKind::interrupt(), "SIGINT"),
                terminate: listen(SignalKind::terminate(), "SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Resolves on the next delivered signal.
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        {
            let Self { interrupt, terminate } = self;
            tokio::select! {
                _ = wait(interrupt) => log::info!("Received SIGINT, shutting down"),
                _ = wait(terminate) => log::info!("Received SIGTERM, shutting down"),
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            log::info!("Received Ctrl-C, shutting down");
        }
    }
}

#[cfg(unix)]
fn listen(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(sig) => Some(sig),
        Err(e) => {
            log::warn!("Failed to listen for {}: {}", name, e);
            None
        }
    }
}

#[cfg(unix)]
async fn wait(sig: &mut Option<Signal>) {
    if let Some(sig) = sig
        && sig.recv().await.is_some()
    {
        return;
    }
    std::future::pending::<()>().await
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_signal_before_recv_is_held() {
        let mut shutdown = ShutdownSignal::install();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown.recv())
            .await
            .expect("SIGTERM delivered before recv was not observed");
    }
}
