use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::clock::{Clock, SystemClock};
use crate::config::{ApiSettings, Settings};
use crate::http_client::{HttpClient, HttpRequest};
use crate::metrics::{ExchangeStats, FetchOutcome, InMemoryMetrics, MetricsSink};
use crate::retry::RetryConfig;
use crate::throttling::ExchangeLimiter;
use crate::{
    Candle, ExchangeId, HistoricalSeries, Interval, Observation, ObservationFields, Symbol,
    UtcDateTime, ValidationError,
};

/// Errors surfaced by exchange calls.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("exchange '{exchange}' is not supported or has no configured endpoint")]
    UnsupportedExchange { exchange: String },

    #[error("{exchange} request failed after {attempts} attempt(s): {message}")]
    Transport {
        exchange: ExchangeId,
        attempts: u32,
        message: String,
    },

    #[error("circuit open for {exchange}; request rejected without network access")]
    CircuitOpen { exchange: ExchangeId },

    #[error("{exchange} returned HTTP {status}")]
    Status { exchange: ExchangeId, status: u16 },

    #[error("malformed {exchange} response: {message}")]
    MalformedResponse {
        exchange: ExchangeId,
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ExchangeError {
    /// Whether the upstream could not be reached (as opposed to a bad request or payload).
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::CircuitOpen { .. })
    }
}

/// Candle query for `GET {base}/klines`.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleRequest {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub interval: Interval,
    pub limit: Option<usize>,
    pub start: Option<UtcDateTime>,
    pub end: Option<UtcDateTime>,
}

impl CandleRequest {
    pub fn new(symbol: Symbol, interval: Interval) -> Self {
        Self {
            exchange: ExchangeId::Binance,
            symbol,
            interval,
            limit: None,
            start: None,
            end: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_range(mut self, start: Option<UtcDateTime>, end: Option<UtcDateTime>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn on(mut self, exchange: ExchangeId) -> Self {
        self.exchange = exchange;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == Some(0) {
            return Err(ValidationError::ZeroLimit);
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ValidationError::InvalidTimeRange);
            }
        }
        Ok(())
    }
}

struct ExchangeLane {
    limiter: ExchangeLimiter,
    breaker: CircuitBreaker,
}

#[derive(Default)]
struct Tally {
    requests: u64,
    errors: u64,
}

/// Rate-limited, retrying, circuit-broken access to the exchange REST APIs.
pub struct ExchangeClient {
    api: ApiSettings,
    retry: RetryConfig,
    http: Arc<dyn HttpClient>,
    lanes: BTreeMap<ExchangeId, ExchangeLane>,
    metrics: Arc<dyn MetricsSink>,
}

impl ExchangeClient {
    pub fn new(settings: &Settings, http: Arc<dyn HttpClient>) -> Self {
        Self::with_clock(settings, http, Arc::new(SystemClock))
    }

    /// Client whose circuit breakers read time from `clock`.
    pub fn with_clock(settings: &Settings, http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        let lanes = ExchangeId::ALL
            .into_iter()
            .map(|exchange| {
                let lane = ExchangeLane {
                    limiter: ExchangeLimiter::new(exchange, settings.api.rate_limit_per_minute),
                    breaker: CircuitBreaker::with_clock(
                        exchange.as_str(),
                        settings.circuit_breaker,
                        Arc::clone(&clock),
                    ),
                };
                (exchange, lane)
            })
            .collect();

        Self {
            api: settings.api.clone(),
            retry: settings.retry.clone(),
            http,
            lanes,
            metrics: Arc::new(InMemoryMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn metrics(&self) -> Arc<dyn MetricsSink> {
        Arc::clone(&self.metrics)
    }

    pub fn stats(&self) -> BTreeMap<ExchangeId, ExchangeStats> {
        self.metrics.snapshot()
    }

    pub fn circuit_state(&self, exchange: ExchangeId) -> CircuitState {
        self.lanes
            .get(&exchange)
            .map(|lane| lane.breaker.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Whether `exchange` has a configured endpoint.
    pub fn supports(&self, exchange: ExchangeId) -> bool {
        self.api.endpoint(exchange).is_some()
    }

    /// Fetches current tickers for `symbols`. Items that fail observation construction are
    /// skipped and counted as errors.
    pub async fn fetch_ticker(
        &self,
        symbols: &[Symbol],
        exchange: ExchangeId,
    ) -> Result<Vec<Observation>, ExchangeError> {
        if symbols.is_empty() {
            return Err(ValidationError::EmptySymbolList.into());
        }
        let base = self.endpoint(exchange)?;
        let joined = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let request = HttpRequest::get(format!("{base}/ticker/price"))
            .with_query("symbols", joined)
            .with_timeout(self.api.timeout);

        let mut tally = Tally::default();
        let result = self
            .send(exchange, request, &mut tally)
            .await
            .and_then(|body| parse_tickers(exchange, &body, &mut tally));
        self.finish(exchange, tally, result.is_ok());

        let observations = result?;
        debug!(%exchange, requested = symbols.len(), received = observations.len(), "ticker fetch complete");
        Ok(observations)
    }

    /// Fetches one page of candles (at most the exchange's per-request cap).
    pub async fn fetch_candles(
        &self,
        request: &CandleRequest,
    ) -> Result<HistoricalSeries, ExchangeError> {
        request.validate()?;
        let exchange = request.exchange;
        let base = self.endpoint(exchange)?;

        let mut http = HttpRequest::get(format!("{base}/klines"))
            .with_query("symbol", request.symbol.as_str())
            .with_query("interval", request.interval.to_string())
            .with_timeout(self.api.timeout);
        if let Some(limit) = request.limit {
            http = http.with_query("limit", limit.to_string());
        }
        if let Some(start) = request.start {
            http = http.with_query("startTime", start.unix_millis().to_string());
        }
        if let Some(end) = request.end {
            http = http.with_query("endTime", end.unix_millis().to_string());
        }

        let mut tally = Tally::default();
        let result = self
            .send(exchange, http, &mut tally)
            .await
            .and_then(|body| parse_klines(exchange, request, &body, &mut tally));
        self.finish(exchange, tally, result.is_ok());

        result
    }

    fn endpoint(&self, exchange: ExchangeId) -> Result<&str, ExchangeError> {
        self.api
            .endpoint(exchange)
            .ok_or_else(|| ExchangeError::UnsupportedExchange {
                exchange: exchange.to_string(),
            })
    }

    fn lane(&self, exchange: ExchangeId) -> Result<&ExchangeLane, ExchangeError> {
        self.lanes
            .get(&exchange)
            .ok_or_else(|| ExchangeError::UnsupportedExchange {
                exchange: exchange.to_string(),
            })
    }

    fn finish(&self, exchange: ExchangeId, tally: Tally, succeeded: bool) {
        self.metrics.record(FetchOutcome {
            exchange,
            requests: tally.requests,
            errors: tally.errors,
            succeeded_at: succeeded.then(UtcDateTime::now),
        });
    }

    /// Sends `request` with breaker gating, a limiter slot per attempt and retry on transport
    /// failures. Returns the response body of the first 2xx response.
    async fn send(
        &self,
        exchange: ExchangeId,
        request: HttpRequest,
        tally: &mut Tally,
    ) -> Result<String, ExchangeError> {
        let lane = self.lane(exchange)?;
        let mut attempts: u32 = 0;

        loop {
            if !lane.breaker.allow_request() {
                warn!(%exchange, "circuit open, failing fast");
                tally.errors += 1;
                return Err(ExchangeError::CircuitOpen { exchange });
            }

            attempts += 1;
            tally.requests += 1;
            let outcome = {
                let _permit = lane.limiter.acquire().await;
                debug!(%exchange, url = %request.full_url(), attempt = attempts, "sending request");
                self.http.execute(request.clone()).await
            };

            let failure = match outcome {
                Ok(response) if response.is_success() => {
                    lane.breaker.record_success();
                    return Ok(response.body);
                }
                Ok(response) if self.retry.should_retry_status(response.status) => {
                    format!("HTTP {}", response.status)
                }
                Ok(response) => {
                    lane.breaker.record_success();
                    tally.errors += 1;
                    warn!(%exchange, status = response.status, "non-retryable HTTP status");
                    return Err(ExchangeError::Status {
                        exchange,
                        status: response.status,
                    });
                }
                Err(err) if err.is_timeout() => {
                    format!("timed out after {} ms: {err}", request.timeout_ms)
                }
                Err(err) => err.to_string(),
            };

            lane.breaker.record_failure();
            tally.errors += 1;

            if !self.retry.has_attempts_left(attempts) {
                error!(%exchange, attempts, error = %failure, "request failed, retries exhausted");
                return Err(ExchangeError::Transport {
                    exchange,
                    attempts,
                    message: failure,
                });
            }

            let delay = self.retry.delay_for_retry(attempts - 1);
            let delay_ms = delay.as_millis() as u64;
            warn!(%exchange, attempt = attempts, delay_ms, error = %failure, "transport failure, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Exchange number that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerItem {
    symbol: String,
    price: Numeric,
    #[serde(default)]
    volume: Option<Numeric>,
    #[serde(default, alias = "change_24h")]
    price_change_percent: Option<Numeric>,
    #[serde(default, alias = "market_cap")]
    market_cap: Option<Numeric>,
    #[serde(default)]
    rank: Option<u32>,
    #[serde(default, alias = "volatility_index")]
    volatility_index: Option<Numeric>,
    #[serde(default, alias = "closeTime")]
    time: Option<i64>,
}

impl TickerItem {
    fn into_observation(self) -> Result<Observation, String> {
        let symbol = Symbol::parse(&self.symbol).map_err(|e| e.to_string())?;
        let price = self
            .price
            .value()
            .ok_or_else(|| "price is not numeric".to_owned())?;
        let timestamp = match self.time {
            Some(millis) => UtcDateTime::from_unix_millis(millis).map_err(|e| e.to_string())?,
            None => UtcDateTime::now(),
        };

        let mut fields = ObservationFields::new(symbol, price, timestamp);
        fields.volume = optional_numeric(self.volume.as_ref(), "volume")?.unwrap_or(0.0);
        fields.change_24h =
            optional_numeric(self.price_change_percent.as_ref(), "change_24h")?.unwrap_or(0.0);
        fields.market_cap = optional_numeric(self.market_cap.as_ref(), "market_cap")?;
        fields.rank = self.rank;
        fields.volatility_index =
            optional_numeric(self.volatility_index.as_ref(), "volatility_index")?;

        Observation::new(fields).map_err(|e| e.to_string())
    }
}

fn optional_numeric(value: Option<&Numeric>, field: &str) -> Result<Option<f64>, String> {
    value
        .map(|raw| raw.value().ok_or_else(|| format!("{field} is not numeric")))
        .transpose()
}

fn parse_tickers(
    exchange: ExchangeId,
    body: &str,
    tally: &mut Tally,
) -> Result<Vec<Observation>, ExchangeError> {
    let payload: Value = serde_json::from_str(body).map_err(|e| ExchangeError::MalformedResponse {
        exchange,
        message: e.to_string(),
    })?;

    let items = match payload {
        Value::Array(items) => items,
        item @ Value::Object(_) => vec![item],
        other => {
            return Err(ExchangeError::MalformedResponse {
                exchange,
                message: format!("expected ticker array, got {other}"),
            })
        }
    };

    let mut observations = Vec::with_capacity(items.len());
    for item in items {
        let parsed = serde_json::from_value::<TickerItem>(item)
            .map_err(|e| e.to_string())
            .and_then(TickerItem::into_observation);
        match parsed {
            Ok(observation) => observations.push(observation),
            Err(reason) => {
                tally.errors += 1;
                error!(%exchange, %reason, "skipping invalid ticker item");
            }
        }
    }
    Ok(observations)
}

fn parse_klines(
    exchange: ExchangeId,
    request: &CandleRequest,
    body: &str,
    tally: &mut Tally,
) -> Result<HistoricalSeries, ExchangeError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| ExchangeError::MalformedResponse {
            exchange,
            message: format!("expected kline rows: {e}"),
        })?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        match parse_kline_row(request, &row) {
            Ok(candle) => candles.push(candle),
            Err(reason) => {
                tally.errors += 1;
                warn!(%exchange, symbol = %request.symbol, %reason, "skipping invalid kline row");
            }
        }
    }

    candles.sort_by_key(|candle| candle.timestamp);
    candles.dedup_by_key(|candle| candle.timestamp);
    Ok(HistoricalSeries::new(
        request.symbol.clone(),
        request.interval,
        candles,
    )?)
}

fn parse_kline_row(request: &CandleRequest, row: &[Value]) -> Result<Candle, String> {
    if row.len() < 6 {
        return Err(format!("expected at least 6 columns, got {}", row.len()));
    }

    let number = |index: usize, name: &str| -> Result<f64, String> {
        serde_json::from_value::<Numeric>(row[index].clone())
            .ok()
            .and_then(|raw| raw.value())
            .ok_or_else(|| format!("{name} is not numeric"))
    };

    let open_time = number(0, "open time")? as i64;
    let timestamp = UtcDateTime::from_unix_millis(open_time).map_err(|e| e.to_string())?;
    Candle::new(
        request.symbol.clone(),
        request.interval,
        timestamp,
        number(1, "open")?,
        number(2, "high")?,
        number(3, "low")?,
        number(4, "close")?,
        number(5, "volume")?,
    )
    .map_err(|e| e.to_string())
}
