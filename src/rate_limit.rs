//! Sliding-window admission control per client key.
//!
//! Every client key owns a window of the instants at which its requests were
//! admitted. A request is admitted when fewer than `capacity` of those instants
//! are younger than [`WINDOW`]; expired instants are pruned on every check.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::reclaimer::Reclaimer;
use crate::store::{Window, WindowStore};

/// Trailing interval over which requests are counted.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Interval between full-store sweeps by the [`Reclaimer`].
pub const RECLAIM_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Capacity used when the configured value is zero.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

/// Source of the current instant.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Clock backed by the tokio timer, so paused test time applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Recorded; `remaining` more requests fit in the current window.
    Allowed { remaining: u32 },
    /// Not recorded; a slot frees up after `retry_after`.
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Counts from one sweep of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimStats {
    /// Keys still holding valid timestamps.
    pub retained: usize,
    /// Keys removed because nothing valid was left.
    pub evicted: usize,
    /// Expired timestamps dropped across all keys.
    pub pruned: usize,
}

/// Keep only the timestamps younger than [`WINDOW`] at `now`.
///
/// Returns how many were dropped.
pub(crate) fn prune_expired(window: &mut Window, now: Instant) -> usize {
    let before = window.len();
    window.retain(|at| now.saturating_duration_since(*at) < WINDOW);
    before - window.len()
}

/// Normalize a configured per-minute quota; zero means "use the default".
pub fn effective_capacity(requests_per_minute: u32) -> u32 {
    if requests_per_minute == 0 {
        DEFAULT_REQUESTS_PER_MINUTE
    } else {
        requests_per_minute
    }
}

/// Per-client sliding-window rate limiter.
pub struct RateLimiter {
    store: WindowStore,
    capacity: u32,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter admitting `requests_per_minute` requests per client.
    ///
    /// Zero is replaced by [`DEFAULT_REQUESTS_PER_MINUTE`]. No background
    /// sweep is started; see [`RateLimiter::start`].
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_clock(requests_per_minute, Arc::new(TokioClock))
    }

    pub fn with_clock(requests_per_minute: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: WindowStore::new(),
            capacity: effective_capacity(requests_per_minute),
            clock,
        }
    }

    /// Create a limiter and spawn its [`Reclaimer`] on the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(requests_per_minute: u32) -> (Arc<Self>, Reclaimer) {
        let limiter = Arc::new(Self::new(requests_per_minute));
        let reclaimer = Reclaimer::spawn(Arc::clone(&limiter));
        (limiter, reclaimer)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Admit or reject one request from `key` at `now`.
    pub fn allow(&self, key: &str, now: Instant) -> bool {
        self.decide(key, now).is_allowed()
    }

    /// Like [`allow`](Self::allow) but reads the limiter's clock.
    pub fn check(&self, key: &str) -> Decision {
        self.decide(key, self.clock.now())
    }

    /// Prune the window for `key`, then record `now` if a slot is free.
    ///
    /// The whole sequence runs under the store's lock for `key`, so two
    /// concurrent calls can never both take the last slot.
    pub fn decide(&self, key: &str, now: Instant) -> Decision {
        let capacity = self.capacity as usize;

        self.store.with_window(key, |window| {
            prune_expired(window, now);

            if window.len() >= capacity {
                // The oldest valid timestamp is the first to leave the window.
                let oldest = window.iter().min().copied().unwrap_or(now);
                let retry_after = WINDOW.saturating_sub(now.saturating_duration_since(oldest));
                trace!(client = key, count = window.len(), "window full");
                return Decision::Denied { retry_after };
            }

            window.push(now);
            Decision::Allowed {
                remaining: (capacity - window.len()) as u32,
            }
        })
    }

    /// Sweep every window, dropping expired timestamps and empty keys.
    pub fn reclaim(&self, now: Instant) -> ReclaimStats {
        let mut stats = ReclaimStats::default();
        self.store.sweep(|_, window| {
            stats.pruned += prune_expired(window, now);
            if window.is_empty() {
                stats.evicted += 1;
            } else {
                stats.retained += 1;
            }
        });
        stats
    }

    /// Number of client keys currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }

    pub fn window_len(&self, key: &str) -> Option<usize> {
        self.store.window_len(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn fourth_request_in_window_is_denied() {
        let rl = RateLimiter::new(3);
        let t0 = Instant::now();
        assert!(rl.allow("ip1", t0));
        assert!(rl.allow("ip1", t0 + secs(1)));
        assert!(rl.allow("ip1", t0 + secs(2)));
        assert!(!rl.allow("ip1", t0 + secs(3)));
        // denied requests are not recorded
        assert_eq!(rl.window_len("ip1"), Some(3));
    }

    #[test]
    fn slot_frees_once_first_request_expires() {
        let rl = RateLimiter::new(3);
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(rl.allow("ip1", t0 + secs(i)));
        }
        assert!(!rl.allow("ip1", t0 + secs(3)));

        assert!(rl.allow("ip1", t0 + secs(61)));
        // t0 and t0+1s are both a full window old by now
        assert_eq!(rl.window_len("ip1"), Some(2));
    }

    #[test]
    fn keys_are_isolated() {
        let rl = RateLimiter::new(1);
        let t0 = Instant::now();
        assert!(rl.allow("ip2", t0));
        assert!(!rl.allow("ip2", t0));
        assert!(rl.allow("ip3", t0));
    }

    #[test]
    fn zero_capacity_means_default() {
        let zero = RateLimiter::new(0);
        let hundred = RateLimiter::new(100);
        assert_eq!(zero.capacity(), hundred.capacity());

        let t0 = Instant::now();
        for _ in 0..100 {
            assert!(zero.allow("ip", t0));
            assert!(hundred.allow("ip", t0));
        }
        assert!(!zero.allow("ip", t0));
        assert!(!hundred.allow("ip", t0));
    }

    #[test]
    fn empty_key_is_an_ordinary_key() {
        let rl = RateLimiter::new(1);
        let t0 = Instant::now();
        assert!(rl.allow("", t0));
        assert!(!rl.allow("", t0));
        assert!(rl.allow("other", t0));
    }

    #[test]
    fn denial_reports_time_until_oldest_expires() {
        let rl = RateLimiter::new(2);
        let t0 = Instant::now();
        assert_eq!(rl.decide("ip", t0), Decision::Allowed { remaining: 1 });
        assert_eq!(rl.decide("ip", t0 + secs(10)), Decision::Allowed { remaining: 0 });
        assert_eq!(
            rl.decide("ip", t0 + secs(15)),
            Decision::Denied { retry_after: secs(45) }
        );
    }

    #[test]
    fn repeated_checks_never_grow_window() {
        let rl = RateLimiter::new(2);
        let t0 = Instant::now();
        rl.allow("ip", t0);
        rl.allow("ip", t0 + secs(30));

        let mut last = rl.window_len("ip").unwrap_or(0);
        for step in 1..=10 {
            rl.allow("ip", t0 + secs(30 + step * 5));
            let len = rl.window_len("ip").unwrap_or(0);
            assert!(len <= rl.capacity() as usize);
            if step < 6 {
                // window stays full until t0+30s expires, so nothing is recorded
                assert!(len <= last);
            }
            last = len;
        }
    }

    #[test]
    fn concurrent_callers_never_exceed_capacity() {
        let rl = Arc::new(RateLimiter::new(50));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rl = Arc::clone(&rl);
                thread::spawn(move || (0..25).filter(|_| rl.allow("shared", now)).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(rl.window_len("shared"), Some(50));
    }

    #[test]
    fn reclaim_evicts_stale_keys() {
        let rl = RateLimiter::new(10);
        let t0 = Instant::now();
        rl.allow("stale", t0);
        rl.allow("fresh", t0 + secs(50));
        rl.allow("fresh", t0 + secs(90));

        let stats = rl.reclaim(t0 + secs(115));
        assert_eq!(
            stats,
            ReclaimStats {
                retained: 1,
                evicted: 1,
                pruned: 2,
            }
        );
        assert_eq!(rl.window_len("stale"), None);
        assert_eq!(rl.window_len("fresh"), Some(1));
        assert_eq!(rl.tracked_clients(), 1);
    }
}
