//! Process-wide request rate limiter.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Fixed-interval gate bounding aggregate outbound request rate.
///
/// One instance is shared by every worker; no fetch may bypass it. The
/// remote host enforces an undocumented ceiling around 2-3 requests per
/// second and degrades sharply rather than gracefully beyond it, so the
/// gate is global and conservative, not per-worker.
///
/// Each `acquire` reserves the next free slot under the mutex and then
/// sleeps outside any shared state until that slot arrives, so permits are
/// handed out exactly `interval` apart no matter how many workers contend.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// Gate allowing at most `requests_per_second` outbound requests.
    pub fn new(requests_per_second: f64) -> Self {
        let rps = requests_per_second.max(0.001);
        Self {
            interval: Duration::from_secs_f64(1.0 / rps),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Spacing between consecutive permits.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until a permit is available. Permits replenish at a fixed
    /// interval; callers are served in lock-acquisition order.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.interval;
            slot
        };
        sleep_until(slot).await;
    }
}
