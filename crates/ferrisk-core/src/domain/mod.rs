//! # Domain Models
//!
//! Canonical market-data types for ferrisk.
//!
//! All models enforce their invariants at construction time:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observation`] | Validated live price/volume tick with a quality score |
//! | [`Candle`] | OHLCV candle with an optional indicator bag |
//! | [`HistoricalSeries`] | Ordered candles for one symbol/interval |
//! | [`Symbol`] | 2-10 character uppercase alphanumeric symbol |
//! | [`Interval`] | Candle interval such as `1m`, `4h`, `1d`, `1w` |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ```rust,ignore
//! use ferrisk_core::{Candle, Interval, Symbol, UtcDateTime, ValidationError};
//!
//! let ts = UtcDateTime::parse("2024-01-01T00:00:00Z")?;
//! let btc = Symbol::parse("BTC")?;
//!
//! // high < low is rejected
//! let invalid = Candle::new(btc, Interval::ONE_DAY, ts, 100.0, 95.0, 105.0, 102.0, 10.0);
//! assert!(matches!(invalid, Err(ValidationError::InvalidCandleRange)));
//! ```

mod interval;
mod models;
mod symbol;
mod timestamp;

pub use interval::{Interval, IntervalUnit};
pub use models::{Candle, HistoricalSeries, Observation, ObservationFields, ObservationMetadata};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
