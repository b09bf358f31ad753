//! # Ferrisk Core
//!
//! Market-data ingestion and validation for the Ferrisk crypto analytics toolkit.
//!
//! ## Overview
//!
//! - **Validated domain models** for observations, candles and candle series
//! - **Exchange client** with per-exchange concurrency limits, retry with backoff and a
//!   rolling-window circuit breaker
//! - **Historical series store** with paging, aggregation and batched ticker updates
//! - **Ingestion pipeline** combining anomaly validation and cross-exchange reconciliation
//! - **Settings** assembled from defaults, a JSON file and `FERRISK_*` environment variables
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache abstraction and cache modes |
//! | [`circuit_breaker`] | Closed/open/half-open breaker with injected clock |
//! | [`clock`] | Monotonic clock seam |
//! | [`config`] | Runtime settings |
//! | [`domain`] | Symbols, intervals, timestamps, observations, candles |
//! | [`exchange_client`] | REST access to exchanges |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`metrics`] | Per-exchange request statistics |
//! | [`pipeline`] | Streaming ingestion |
//! | [`reconcile`] | Cross-exchange price check |
//! | [`retry`] | Backoff policies |
//! | [`series_store`] | Candle fetching, aggregation, batch updates |
//! | [`synthetic`] | Seeded offline candle source |
//! | [`throttling`] | Per-exchange admission control |
//! | [`validator`] | Observation anomaly checks |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ferrisk_core::{ExchangeClient, ExchangeId, ReqwestHttpClient, Settings, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let http = Arc::new(ReqwestHttpClient::new(settings.api.timeout, 16));
//!     let client = ExchangeClient::new(&settings, http);
//!
//!     let tickers = client
//!         .fetch_ticker(&[Symbol::parse("BTCUSDT")?], ExchangeId::Binance)
//!         .await?;
//!     println!("{}", tickers[0].price());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange_client;
pub mod http_client;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod series_store;
pub mod source;
pub mod synthetic;
pub mod throttling;
pub mod validator;

pub use cache::{CacheMode, InMemoryTtlCache, TtlCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ApiSettings, BatchSettings, CacheSettings, ConfigError, FeatureColumn, MlSettings, Settings,
    ValidationSettings,
};
pub use domain::{
    Candle, HistoricalSeries, Interval, IntervalUnit, Observation, ObservationFields,
    ObservationMetadata, Symbol, UtcDateTime,
};
pub use error::ValidationError;
pub use exchange_client::{CandleRequest, ExchangeClient, ExchangeError};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use metrics::{ExchangeStats, FetchOutcome, InMemoryMetrics, MetricsSink};
pub use pipeline::{IngestReport, MarketDataPipeline, RejectedObservation};
pub use reconcile::CrossExchangeReconciler;
pub use retry::{Backoff, RetryConfig};
pub use series_store::{
    aggregate, AggregationSpec, BatchUpdateSummary, CandleSource, HistoricalSeriesStore, Reducer,
    SeriesRange, MAX_CANDLES_PER_REQUEST,
};
pub use source::ExchangeId;
pub use synthetic::SyntheticCandleSource;
pub use throttling::{ExchangeLimiter, LimiterPermit};
pub use validator::MarketDataValidator;
