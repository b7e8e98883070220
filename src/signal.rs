//! Graceful-shutdown signalling for follow mode.
//!
//! SIGINT/SIGTERM set a shared flag that the follower polls between poll
//! cycles and line batches, so the loop always finishes the lines it has
//! already read before exiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

/// Shared cooperative-shutdown flag.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Spawn a task that sets `flag` on SIGINT or SIGTERM.
///
/// Registration can fail in restricted environments; the flag then simply
/// never fires and the process runs until killed.
pub fn spawn_listener(flag: ShutdownFlag) {
    tokio::spawn(async move {
        let sigint = signal(SignalKind::interrupt());
        let sigterm = signal(SignalKind::terminate());

        match (sigint, sigterm) {
            (Ok(mut int), Ok(mut term)) => {
                tokio::select! {
                    _ = int.recv() => info!("received SIGINT, finishing current batch"),
                    _ = term.recv() => info!("received SIGTERM, finishing current batch"),
                }
                flag.set();
            }
            (Ok(mut int), Err(e)) => {
                warn!("failed to register SIGTERM handler: {e}");
                int.recv().await;
                info!("received SIGINT, finishing current batch");
                flag.set();
            }
            (Err(e), Ok(mut term)) => {
                warn!("failed to register SIGINT handler: {e}");
                term.recv().await;
                info!("received SIGTERM, finishing current batch");
                flag.set();
            }
            (Err(e1), Err(e2)) => {
                warn!("no signal handlers registered ({e1}; {e2}); graceful shutdown disabled");
            }
        }
    });
}
