use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::scheduler::hub::Hub;

/// Periodic statistics and background pruning driver.
///
/// Wakes every `interval`, drops expired empty spokes, and emits the hub
/// counters. Runs until the shutdown token is cancelled, so tests and the
/// broker can stop it deterministically.
pub async fn run_status_loop(hub: Arc<Hub>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; skip it so the loop reports on
    // the configured cadence.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("status loop stopped");
                return;
            }
            _ = ticker.tick() => {
                let pruned = hub.prune();
                if pruned > 0 {
                    tracing::debug!(pruned, "pruned expired empty spokes");
                }

                let status = hub.status();
                tracing::info!(
                    spokes = status.spoke_count,
                    pending = status.pending_jobs,
                    reserved = status.reserved_jobs,
                    removed = status.removed_jobs,
                    past_spoke = status.past_spoke_pending,
                    "hub status"
                );
                for depth in &status.spoke_depths {
                    tracing::debug!(
                        spoke = %depth.id,
                        start = %depth.start,
                        end = %depth.end,
                        pending = depth.pending_jobs,
                        "spoke depth"
                    );
                }
            }
        }
    }
}
