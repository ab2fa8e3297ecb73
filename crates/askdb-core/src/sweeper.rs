//! Cancellable periodic sweep tasks for the TTL stores.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a background sweep loop. The loop runs until `shutdown` is
/// called; sweeps only log, they never propagate failures.
pub struct SweeperHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Spawn a sweep loop that calls `sweep` every `period` and logs how
    /// many entries it removed.
    pub fn spawn<F>(name: &'static str, period: Duration, sweep: F) -> Self
    where
        F: Fn() -> usize + Send + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a sweep never
            // races store construction.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = sweep();
                        if removed > 0 {
                            tracing::info!(sweeper = name, removed, "sweep removed expired entries");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
            tracing::debug!(sweeper = name, "sweep task stopped");
        });

        tracing::info!(sweeper = name, period_secs = period.as_secs(), "sweep task started");
        Self {
            name,
            shutdown,
            task,
        }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(sweeper = self.name, %err, "sweep task did not stop cleanly");
        }
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
