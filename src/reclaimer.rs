use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{RECLAIMED_CLIENTS, TRACKED_CLIENTS};
use crate::rate_limit::{RECLAIM_PERIOD, RateLimiter};

// Background sweep that drops expired timestamps and idle clients.
//
// Runs until `shutdown` is called or the handle is dropped.
pub struct Reclaimer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Reclaimer {
    pub fn spawn(limiter: Arc<RateLimiter>) -> Self {
        Self::spawn_with_period(limiter, RECLAIM_PERIOD)
    }

    pub fn spawn_with_period(limiter: Arc<RateLimiter>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(reclaim_loop(limiter, period, token.clone()));
        Self { token, task }
    }

    /// Stop the sweep and wait for the task to exit.
    ///
    /// A sweep already in progress runs to completion first.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!("Reclaimer task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn reclaim_loop(limiter: Arc<RateLimiter>, period: Duration, token: CancellationToken) {
    // first sweep one full period after start
    let mut ticker = interval_at(Instant::now() + period, period);

    info!("Reclaimer started (interval: {:?})", period);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let stats = limiter.reclaim(limiter.now());

                RECLAIMED_CLIENTS.inc_by(stats.evicted as f64);
                TRACKED_CLIENTS.set(stats.retained as f64);

                if stats.evicted > 0 {
                    info!(
                        evicted = stats.evicted,
                        retained = stats.retained,
                        pruned = stats.pruned,
                        "reclaimed idle clients"
                    );
                } else {
                    debug!(retained = stats.retained, pruned = stats.pruned, "sweep done");
                }
            }
        }
    }

    info!("Reclaimer stopped");
}
