//! Periodic expiry sweep over the job store.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::infra::storage::JobStore;

/// Sweeps `store` every `interval`, removing jobs older than `ttl`, until
/// `shutdown` resolves. The first sweep runs immediately. Returns the total
/// number of jobs removed.
pub async fn run_sweeper<F>(store: JobStore, ttl: Duration, interval: Duration, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        target = "application::cleanup",
        op = "start",
        ttl_secs = ttl.as_secs(),
        interval_secs = interval.as_secs(),
    );

    let mut total = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let store = store.clone();
                match tokio::task::spawn_blocking(move || store.sweep_expired(ttl)).await {
                    Ok(removed) => total += removed,
                    Err(err) => error!(
                        target = "application::cleanup",
                        op = "sweep",
                        error = %err,
                        "sweep task panicked"
                    ),
                }
            }
        }
    }

    info!(target = "application::cleanup", op = "stop", total_removed = total);
    total
}
