//! Background eviction task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::store::EntryStore;

/// Handle to the task that periodically evicts stale entries.
///
/// The task wakes every `interval`, removes entries older than `ttl`, and
/// goes back to sleep. It stops when [`shutdown`](Self::shutdown) is called
/// or the handle is dropped, whichever comes first. Stopping is signalled
/// through a watch channel: sending never blocks and never fails, so
/// shutting down twice, or after the task has already ended, is harmless.
#[derive(Debug)]
pub struct Sweeper {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweep loop onto the current Tokio runtime.
    ///
    /// The first sweep happens one full `interval` after spawning.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(store: Arc<EntryStore>, ttl: Duration, interval: Duration) -> Self {
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(run(store, ttl, interval, stopped));
        info!(ttl = ?ttl, interval = ?interval, "cache sweeper started");
        Self { stop, task }
    }

    /// Asks the task to stop. Entries already stored are never evicted
    /// afterwards.
    pub fn shutdown(&self) {
        self.stop.send_replace(true);
    }

    /// Returns `true` once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    store: Arc<EntryStore>,
    ttl: Duration,
    interval: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    match Instant::now().checked_add(interval) {
        Some(first_sweep) => {
            sweep_until_stopped(&store, ttl, interval, first_sweep, &mut stopped).await;
        }
        None => {
            warn!(interval = ?interval, "sweep interval out of range; eviction disabled");
            wait_for_stop(&mut stopped).await;
        }
    }

    info!("cache sweeper stopped");
}

async fn sweep_until_stopped(
    store: &EntryStore,
    ttl: Duration,
    interval: Duration,
    first_sweep: Instant,
    stopped: &mut watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(first_sweep, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            changed = stopped.changed() => {
                // A closed channel means the handle was dropped.
                if changed.is_err() || *stopped.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let removed = store.remove_expired(ttl, Instant::now());
                debug!(removed, remaining = store.len(), "cache sweep finished");
            }
        }
    }
}

// Returns once a stop is requested or the handle is gone.
async fn wait_for_stop(stopped: &mut watch::Receiver<bool>) {
    loop {
        if *stopped.borrow_and_update() {
            return;
        }
        if stopped.changed().await.is_err() {
            return;
        }
    }
}
