//! Per-exchange request statistics.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Mutex;

use serde::Serialize;

use crate::{ExchangeId, UtcDateTime};

/// Request counters for one exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExchangeStats {
    pub requests: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<UtcDateTime>,
}

/// Outcome of one logical fetch, applied to the stats in a single update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOutcome {
    pub exchange: ExchangeId,
    /// Network attempts made, including retries.
    pub requests: u64,
    /// Failed attempts plus items dropped during parsing.
    pub errors: u64,
    pub succeeded_at: Option<UtcDateTime>,
}

/// Sink receiving fetch outcomes from the exchange client.
pub trait MetricsSink: Debug + Send + Sync {
    fn record(&self, outcome: FetchOutcome);

    fn snapshot(&self) -> BTreeMap<ExchangeId, ExchangeStats>;
}

/// Default sink keeping counters in memory for the lifetime of the client.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    stats: Mutex<BTreeMap<ExchangeId, ExchangeStats>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, exchange: ExchangeId) -> ExchangeStats {
        self.stats
            .lock()
            .expect("metrics lock is not poisoned")
            .get(&exchange)
            .copied()
            .unwrap_or_default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record(&self, outcome: FetchOutcome) {
        let mut stats = self.stats.lock().expect("metrics lock is not poisoned");
        let entry = stats.entry(outcome.exchange).or_default();
        entry.requests += outcome.requests;
        entry.errors += outcome.errors;
        if let Some(at) = outcome.succeeded_at {
            entry.last_success = Some(at);
        }
    }

    fn snapshot(&self) -> BTreeMap<ExchangeId, ExchangeStats> {
        self.stats
            .lock()
            .expect("metrics lock is not poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_counts_and_keeps_latest_success() {
        let metrics = InMemoryMetrics::new();
        let first = UtcDateTime::from_unix_millis(1_700_000_000_000).expect("valid");
        let second = UtcDateTime::from_unix_millis(1_700_000_060_000).expect("valid");

        metrics.record(FetchOutcome {
            exchange: ExchangeId::Binance,
            requests: 3,
            errors: 2,
            succeeded_at: Some(first),
        });
        metrics.record(FetchOutcome {
            exchange: ExchangeId::Binance,
            requests: 1,
            errors: 1,
            succeeded_at: None,
        });
        metrics.record(FetchOutcome {
            exchange: ExchangeId::Binance,
            requests: 1,
            errors: 0,
            succeeded_at: Some(second),
        });

        let stats = metrics.get(ExchangeId::Binance);
        assert_eq!(stats.requests, 5);
        assert_eq!(stats.errors, 3);
        assert_eq!(stats.last_success, Some(second));
        assert_eq!(metrics.get(ExchangeId::Kraken), ExchangeStats::default());
    }
}
