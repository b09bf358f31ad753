use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::source::ExchangeId;

/// Share of the configured rate limit that may be in flight at once.
const CONCURRENCY_HEADROOM: f64 = 0.8;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-exchange admission control: a bounded semaphore for in-flight requests plus a
/// per-minute pacing quota.
#[derive(Clone)]
pub struct ExchangeLimiter {
    exchange: ExchangeId,
    slots: Arc<Semaphore>,
    capacity: usize,
    pacing: Arc<DirectRateLimiter>,
}

/// In-flight slot held for the duration of one network attempt. Dropping it frees the slot.
#[derive(Debug)]
pub struct LimiterPermit {
    _slot: OwnedSemaphorePermit,
}

impl ExchangeLimiter {
    pub fn new(exchange: ExchangeId, rate_limit_per_minute: u32) -> Self {
        let capacity = concurrency_for(rate_limit_per_minute);
        Self {
            exchange,
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            pacing: Arc::new(RateLimiter::direct(quota_from_window(
                Duration::from_secs(60),
                rate_limit_per_minute,
            ))),
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Waits for a free slot and then for pacing budget.
    pub async fn acquire(&self) -> LimiterPermit {
        if self.slots.available_permits() == 0 {
            debug!(exchange = %self.exchange, capacity = self.capacity, "waiting for a request slot");
        }
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("exchange semaphore is never closed");
        self.pacing.until_ready().await;
        LimiterPermit { _slot: slot }
    }
}

/// `floor(rate_limit * 0.8)`, never below one slot.
pub fn concurrency_for(rate_limit_per_minute: u32) -> usize {
    ((f64::from(rate_limit_per_minute) * CONCURRENCY_HEADROOM).floor() as usize).max(1)
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
