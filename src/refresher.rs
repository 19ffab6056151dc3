//! Periodic reference refresh.
//!
//! A [`RefreshLoop`] wakes up once per period and asks its manager to
//! `check_and_refresh`. Failures are logged and retried on the next tick.
//! Cancellation is observed between ticks; a refresh already in progress is
//! left to finish on its own.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::manager::SnapshotManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }
}

pub struct RefreshLoop {
    period: Duration,
    shutdown: watch::Sender<bool>,
    state: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

impl RefreshLoop {
    /// Spawn a loop for `manager` on the current tokio runtime.
    ///
    /// The loop holds only a weak reference and exits once the manager is
    /// dropped. Panics if `period` is zero.
    pub fn spawn(manager: &Arc<SnapshotManager>, period: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let state = Arc::new(AtomicU8::new(LoopState::Idle as u8));
        let handle = tokio::spawn(run(
            Arc::downgrade(manager),
            manager.name().to_string(),
            period,
            shutdown_rx,
            state.clone(),
        ));

        Self { period, shutdown, state, handle }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Signal the loop to stop. Returns `false` if it was already signaled.
    pub fn stop(&self) -> bool {
        !self.shutdown.send_replace(true)
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow() || self.state() == LoopState::Stopped
    }

    /// Wait for the loop task to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            error!(error = %e, "Refresh loop task failed");
        }
    }
}

async fn run(
    manager: Weak<SnapshotManager>,
    name: String,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    state: Arc<AtomicU8>,
) {
    state.store(LoopState::Running as u8, Ordering::Release);

    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = async { let _ = shutdown.wait_for(|stopped| *stopped).await; } => break,
            _ = ticker.tick() => {
                let Some(manager) = manager.upgrade() else {
                    debug!(repo = %name, "Snapshot manager dropped");
                    break;
                };
                if let Err(e) = manager.check_and_refresh().await {
                    error!(repo = %name, error = %e, "Error refreshing reference; retrying next tick");
                }
            }
        }
    }

    state.store(LoopState::Stopped as u8, Ordering::Release);
    info!(repo = %name, "Stopping reference hash refresh");
}
