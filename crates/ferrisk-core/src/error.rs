use thiserror::Error;

/// Validation and contract errors exposed by `ferrisk-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} must be between {min} and {max}")]
    SymbolLength { len: usize, min: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },
    #[error("symbol list cannot be empty")]
    EmptySymbolList,

    #[error("invalid interval '{value}', expected <count><m|h|d|w> such as 1m, 4h, 1d, 1w")]
    InvalidInterval { value: String },
    #[error("cannot aggregate {from} candles into {to}: target must be a coarser whole multiple")]
    InvalidAggregation { from: String, to: String },
    #[error("unsupported exchange '{value}', expected one of binance, coingecko, kraken, huobi")]
    UnsupportedExchange { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp {millis}ms is outside the representable range")]
    TimestampOutOfRange { millis: i64 },
    #[error("time range start must be before end")]
    InvalidTimeRange,

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be strictly positive")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("candle high must be >= low")]
    InvalidCandleRange,
    #[error("candle open/close must be within high/low range")]
    InvalidCandleBounds,
    #[error("series candles must share symbol and interval and be ordered by timestamp")]
    InconsistentSeries,

    #[error("request limit must be greater than zero")]
    ZeroLimit,
}
