use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};

/// Runtime circuit state for exchange calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Trips when the failure ratio over the window is strictly above this value.
    pub failure_ratio_threshold: f64,
    /// Number of most recent outcomes considered.
    pub window_size: usize,
    /// Outcomes required in the window before the ratio is evaluated.
    pub minimum_calls: usize,
    #[serde(with = "duration_secs")]
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio_threshold: 0.5,
            window_size: 10,
            minimum_calls: 6,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    /// Start of the half-open probe still awaiting its outcome.
    probe_started: Option<Instant>,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            outcomes: VecDeque::new(),
            opened_at: None,
            probe_started: None,
        }
    }
}

impl CircuitInner {
    fn failure_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|success| !**success).count();
        failures as f64 / self.outcomes.len() as f64
    }

    fn trip(&mut self, at: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(at);
        self.probe_started = None;
    }
}

/// Rolling-window circuit breaker for one exchange (Closed, Open, HalfOpen).
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new("default", CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    /// Whether a call may hit the network. An open breaker whose cool-down elapsed moves to
    /// half-open and lets exactly one probe through; other callers fail fast until the probe
    /// reports. A probe that never reports is replaced after another cool-down.
    pub fn allow_request(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        let now = self.clock.now();
        let cooled_down =
            |since: Instant| now.saturating_duration_since(since) >= self.config.open_timeout;

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.probe_started.is_some_and(|started| !cooled_down(started)) {
                    return false;
                }
                inner.probe_started = Some(now);
                true
            }
            CircuitState::Open => {
                if !inner.opened_at.is_some_and(cooled_down) {
                    return false;
                }
                info!(breaker = %self.name, "circuit half-open, probing upstream");
                inner.state = CircuitState::HalfOpen;
                inner.opened_at = None;
                inner.probe_started = Some(now);
                true
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        if inner.state == CircuitState::HalfOpen {
            info!(breaker = %self.name, "circuit closed after successful probe");
            inner.state = CircuitState::Closed;
            inner.outcomes.clear();
            inner.probe_started = None;
        }
        self.push_outcome(&mut inner, true);
    }

    pub fn record_failure(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        let now = self.clock.now();

        if inner.state == CircuitState::HalfOpen {
            warn!(breaker = %self.name, "probe failed, circuit re-opened");
            inner.trip(now);
            return;
        }

        self.push_outcome(&mut inner, false);
        let ratio = inner.failure_ratio();
        if inner.state == CircuitState::Closed
            && inner.outcomes.len() >= self.config.minimum_calls
            && ratio > self.config.failure_ratio_threshold
        {
            warn!(breaker = %self.name, failure_ratio = ratio, "circuit opened");
            inner.trip(now);
        }
    }

    pub fn state(&self) -> CircuitState {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.state
    }

    pub fn failure_ratio(&self) -> f64 {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.failure_ratio()
    }

    fn push_outcome(&self, inner: &mut CircuitInner, success: bool) {
        inner.outcomes.push_back(success);
        while inner.outcomes.len() > self.config.window_size.max(1) {
            inner.outcomes.pop_front();
        }
    }
}

pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)
    }
}
