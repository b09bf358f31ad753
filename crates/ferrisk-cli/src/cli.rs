//! CLI argument definitions for Ferrisk.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ticker` | Fetch latest prices for symbols |
//! | `candles` | Fetch OHLCV candles, optionally aggregated |
//! | `batch` | Refresh tickers in batches and summarize failures |
//! | `ingest` | Fetch, validate and reconcile tickers |
//! | `risk` | Risk metrics and composite risk score |
//! | `trend` | Technical indicators, momentum and trend direction |
//! | `predict` | Price prediction with a confidence interval |
//! | `stats` | Per-exchange request statistics and circuit state |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON settings file, overridden by `FERRISK_*` variables |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--offline` | `false` | Serve candles from a seeded synthetic source |
//! | `--seed` | `42` | Seed of the synthetic source and the Monte-Carlo predictor |
//! | `--log-level` | `warn` | Log verbosity on stderr |
//!
//! # Examples
//!
//! ```bash
//! ferrisk ticker BTCUSDT ETHUSDT --exchange binance
//! ferrisk candles BTCUSDT --interval 1h --limit 48 --aggregate 4h --pretty
//! ferrisk risk BTCUSDT --windows 30,60,90
//! ferrisk predict BTCUSDT --horizon 7 --confidence 0.95 --offline
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Ferrisk - crypto market-data ingestion and risk analytics
#[derive(Debug, Parser)]
#[command(
    name = "ferrisk",
    author,
    version,
    about = "Crypto market-data ingestion and risk analytics",
    long_about = "Ferrisk fetches crypto market data through rate-limited, circuit-broken exchange \
clients and runs risk, trend and prediction analytics over it. Every command prints a JSON \
envelope with request metadata.\n\
\n\
Use 'ferrisk <command> --help' for command-specific help."
)]
pub struct Cli {
    /// JSON settings file. Environment variables override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve candles from a deterministic synthetic source instead of an exchange.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    /// Seed for the synthetic source and the Monte-Carlo predictor.
    #[arg(long, global = true, default_value_t = 42)]
    pub seed: u64,

    /// Log verbosity written to stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch latest prices for one or more symbols.
    Ticker(TickerArgs),

    /// Fetch OHLCV candles for a symbol.
    Candles(CandlesArgs),

    /// Refresh tickers in batches of the configured size.
    Batch(BatchArgs),

    /// Fetch tickers, validate them and cross-check against a second exchange.
    Ingest(IngestArgs),

    /// Value at risk, volatility, Sharpe ratio, drawdown and a composite risk score.
    Risk(RiskArgs),

    /// RSI, MACD, Bollinger bands, momentum and trend direction.
    Trend(TrendArgs),

    /// Predict a price with a confidence interval.
    Predict(PredictArgs),

    /// Probe exchanges and report request statistics and circuit state.
    Stats(StatsArgs),
}

#[derive(Debug, Args)]
pub struct TickerArgs {
    /// Symbols such as BTCUSDT.
    #[arg(required = true)]
    pub symbols: Vec<String>,

    /// Exchange to query.
    #[arg(long, default_value = "binance")]
    pub exchange: String,
}

#[derive(Debug, Args)]
pub struct CandlesArgs {
    pub symbol: String,

    /// Candle interval (e.g. 1m, 4h, 1d, 1w).
    #[arg(long, default_value = "1d")]
    pub interval: String,

    /// Number of most recent candles; ignored when --start and --end are given.
    #[arg(long, default_value_t = 100)]
    pub limit: usize,

    /// Range start (RFC 3339).
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Range end (RFC 3339).
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Aggregate the fetched candles to a coarser interval.
    #[arg(long)]
    pub aggregate: Option<String>,

    /// Skip the cumulative VWAP indicator when aggregating.
    #[arg(long, default_value_t = false)]
    pub no_vwap: bool,

    #[arg(long, default_value = "binance")]
    pub exchange: String,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    #[arg(required = true)]
    pub symbols: Vec<String>,

    #[arg(long, default_value = "binance")]
    pub exchange: String,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(required = true)]
    pub symbols: Vec<String>,

    #[arg(long, default_value = "binance")]
    pub exchange: String,

    /// Skip the cross-exchange price check.
    #[arg(long, default_value_t = false)]
    pub no_reconcile: bool,
}

#[derive(Debug, Args)]
pub struct RiskArgs {
    pub symbol: String,

    /// Analysis windows in days.
    #[arg(long, value_delimiter = ',', default_values_t = [30, 60, 90])]
    pub windows: Vec<usize>,

    #[arg(long, default_value = "binance")]
    pub exchange: String,
}

#[derive(Debug, Args)]
pub struct TrendArgs {
    pub symbol: String,

    /// Number of daily candles to analyze.
    #[arg(long, default_value_t = 30)]
    pub window: usize,

    /// Indicators to compute (rsi, macd, bollinger); all when omitted.
    #[arg(long, value_delimiter = ',')]
    pub indicators: Vec<String>,

    #[arg(long, default_value = "binance")]
    pub exchange: String,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    pub symbol: String,

    /// Horizon in days: 1, 7, 30 or 90.
    #[arg(long, default_value_t = 7)]
    pub horizon: u32,

    /// Confidence level: 0.68, 0.95 or 0.99.
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Skip the prediction cache read.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    #[arg(long, default_value = "binance")]
    pub exchange: String,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Symbol fetched from every configured exchange before reporting.
    #[arg(long)]
    pub probe: Option<String>,
}
