//! Shared fixtures for the behavior tests: a routed HTTP transport that plays the exchanges,
//! a static candle source and series builders.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use ferrisk_core::{
    Candle, CandleSource, ExchangeClient, ExchangeError, ExchangeId, HistoricalSeries, HttpClient,
    HttpError, HttpRequest, HttpResponse, Interval, RetryConfig, SeriesRange, Settings, Symbol,
    UtcDateTime,
};

pub const DAY_MILLIS: i64 = 86_400_000;

/// Open time of the newest candle the fake exchange knows about (midnight UTC).
pub const LATEST_OPEN_MILLIS: i64 = 1_699_920_000_000;

type Responder = dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync;

/// Transport answering every request through a closure and logging what was sent.
pub struct RoutedHttpClient {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RoutedHttpClient {
    pub fn new(
        responder: impl Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transport where every request is refused.
    pub fn refusing() -> Arc<Self> {
        Self::new(|_| Err(HttpError::new("connection refused")))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("request log lock").len()
    }

    pub fn calls_to(&self, exchange: ExchangeId) -> usize {
        self.requests
            .lock()
            .expect("request log lock")
            .iter()
            .filter(|request| exchange_of(request) == exchange)
            .count()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("request log lock").clone()
    }
}

impl HttpClient for RoutedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = (self.responder)(&request);
        self.requests.lock().expect("request log lock").push(request);
        Box::pin(async move { response })
    }
}

/// Which exchange a request was addressed to, judged by the default endpoint hosts.
pub fn exchange_of(request: &HttpRequest) -> ExchangeId {
    ExchangeId::ALL
        .into_iter()
        .find(|exchange| request.url.contains(exchange.as_str()))
        .unwrap_or(ExchangeId::Binance)
}

/// Symbols named in a ticker request's `symbols` query.
pub fn requested_symbols(request: &HttpRequest) -> Vec<String> {
    request
        .query_value("symbols")
        .map(|raw| raw.split(',').map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Ticker response echoing every requested symbol at the price `price_of` assigns it.
pub fn ticker_response(request: &HttpRequest, price_of: impl Fn(&str) -> f64) -> HttpResponse {
    let items: Vec<serde_json::Value> = requested_symbols(request)
        .iter()
        .map(|symbol| serde_json::json!({ "symbol": symbol, "price": price_of(symbol) }))
        .collect();
    HttpResponse::ok_json(serde_json::Value::Array(items).to_string())
}

/// Klines response over a daily history of `history_days` candles ending at
/// [`LATEST_OPEN_MILLIS`], honoring `limit`, `startTime` and `endTime` like the exchange does.
/// With a start the page runs forward from it, otherwise backward from the end.
pub fn klines_response(request: &HttpRequest, history_days: i64) -> HttpResponse {
    let earliest = LATEST_OPEN_MILLIS - (history_days - 1) * DAY_MILLIS;
    let millis = |name: &str| request.query_value(name).and_then(|raw| raw.parse::<i64>().ok());
    let limit = millis("limit").unwrap_or(500);
    let end = millis("endTime")
        .unwrap_or(LATEST_OPEN_MILLIS)
        .min(LATEST_OPEN_MILLIS);
    let last = end.div_euclid(DAY_MILLIS) * DAY_MILLIS;

    let first = match millis("startTime") {
        Some(start) => (start + DAY_MILLIS - 1).div_euclid(DAY_MILLIS) * DAY_MILLIS,
        None => last - (limit - 1) * DAY_MILLIS,
    }
    .max(earliest);

    let rows: Vec<serde_json::Value> = (0..limit)
        .map(|day| first + day * DAY_MILLIS)
        .take_while(|open| *open <= last)
        .map(|open| {
            let close = 100.0 + ((open - earliest) / DAY_MILLIS) as f64;
            serde_json::json!([open, close, close + 1.0, close - 1.0, close, 10.0])
        })
        .collect();
    HttpResponse::ok_json(serde_json::Value::Array(rows).to_string())
}

/// Settings with immediate retries and no pause between batches.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry = RetryConfig::fixed(Duration::ZERO, 3);
    settings.batch.delay = Duration::ZERO;
    settings
}

pub fn exchange_client(settings: &Settings, http: Arc<RoutedHttpClient>) -> Arc<ExchangeClient> {
    Arc::new(ExchangeClient::new(settings, http))
}

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

/// Daily series with one candle per close, oldest first.
pub fn daily_series(symbol: &Symbol, closes: &[f64]) -> HistoricalSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(day, close)| {
            let timestamp =
                UtcDateTime::from_unix_millis(LATEST_OPEN_MILLIS - (closes.len() - 1 - day) as i64 * DAY_MILLIS)
                    .expect("valid timestamp");
            Candle::new(
                symbol.clone(),
                Interval::ONE_DAY,
                timestamp,
                *close,
                close * 1.01,
                close * 0.99,
                *close,
                1_000.0,
            )
            .expect("valid candle")
        })
        .collect();
    HistoricalSeries::new(symbol.clone(), Interval::ONE_DAY, candles).expect("ordered series")
}

/// Candle source serving one fixed series.
pub struct StaticCandleSource {
    series: HistoricalSeries,
}

impl StaticCandleSource {
    pub fn new(series: HistoricalSeries) -> Arc<Self> {
        Arc::new(Self { series })
    }
}

impl CandleSource for StaticCandleSource {
    fn fetch_series<'a>(
        &'a self,
        _symbol: &'a Symbol,
        _interval: Interval,
        range: SeriesRange,
    ) -> Pin<Box<dyn Future<Output = Result<HistoricalSeries, ExchangeError>> + Send + 'a>> {
        let candles: Vec<Candle> = match range {
            SeriesRange::Limit(limit) => self.series.tail(limit).to_vec(),
            SeriesRange::Between { start, end } => self
                .series
                .candles()
                .iter()
                .filter(|candle| candle.timestamp >= start && candle.timestamp <= end)
                .cloned()
                .collect(),
        };
        let series = HistoricalSeries::new(self.series.symbol().clone(), self.series.interval(), candles)
            .map_err(ExchangeError::from);
        Box::pin(async move { series })
    }
}
