//! Graceful shutdown between ingestion cycles.
//!
//! Signal streams are registered once, before the first cycle, so a SIGINT
//! or SIGTERM that arrives while a cycle is running stays queued and ends
//! the wait that follows instead of being lost.

use std::time::Duration;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Why the wait between cycles ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The interval elapsed; run the next cycle
    Interval,
    /// A termination signal was received
    Shutdown,
}

/// Holds the process's SIGINT and SIGTERM listeners.
///
/// On non-Unix platforms only Ctrl-C is observed.
pub struct Shutdown {
    #[cfg(unix)]
    sigint: Signal,
    #[cfg(unix)]
    sigterm: Signal,
}

impl Shutdown {
    /// Register the signal handlers. Call before the first cycle starts.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigint: signal(SignalKind::interrupt())?,
            #[cfg(unix)]
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Sleep for `interval`, returning early when a signal is (or already was) received.
    pub async fn sleep(&mut self, interval: Duration) -> Wake {
        #[cfg(unix)]
        let sigterm_fut = self.sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = self.sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = async { tokio::signal::ctrl_c().await.ok() };

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                Wake::Shutdown
            }
            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                Wake::Shutdown
            }
            _ = tokio::time::sleep(interval) => Wake::Interval,
        }
    }
}
