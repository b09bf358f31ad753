use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Interval, Symbol, UtcDateTime, ValidationError};

const PRICE_PRECISION: i32 = 8;
const VOLUME_PRECISION: i32 = 2;
const CHANGE_24H_MIN: f64 = -100.0;
const CHANGE_24H_MAX: f64 = 1_000.0;

/// Raw observation fields as delivered by an exchange, prior to validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFields {
    pub symbol: Symbol,
    pub price: f64,
    pub volume: f64,
    pub change_24h: f64,
    pub timestamp: UtcDateTime,
    pub market_cap: Option<f64>,
    pub rank: Option<u32>,
    pub volatility_index: Option<f64>,
}

impl ObservationFields {
    pub fn new(symbol: Symbol, price: f64, timestamp: UtcDateTime) -> Self {
        Self {
            symbol,
            price,
            volume: 0.0,
            change_24h: 0.0,
            timestamp,
            market_cap: None,
            rank: None,
            volatility_index: None,
        }
    }
}

/// Metadata computed once when an observation is constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationMetadata {
    pub data_quality_score: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Validated live price/volume observation for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    symbol: Symbol,
    price: f64,
    volume: f64,
    change_24h: f64,
    timestamp: UtcDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volatility_index: Option<f64>,
    metadata: ObservationMetadata,
}

impl Observation {
    pub fn new(fields: ObservationFields) -> Result<Self, ValidationError> {
        validate_positive("price", fields.price)?;
        validate_non_negative("volume", fields.volume)?;
        validate_finite("change_24h", fields.change_24h)?;
        if !(CHANGE_24H_MIN..=CHANGE_24H_MAX).contains(&fields.change_24h) {
            return Err(ValidationError::OutOfRange {
                field: "change_24h",
                value: fields.change_24h,
                min: CHANGE_24H_MIN,
                max: CHANGE_24H_MAX,
            });
        }
        validate_optional_non_negative("market_cap", fields.market_cap)?;
        validate_optional_non_negative("volatility_index", fields.volatility_index)?;
        if fields.rank == Some(0) {
            return Err(ValidationError::NonPositiveValue { field: "rank" });
        }

        let price = round_to(fields.price, PRICE_PRECISION);
        if price <= 0.0 {
            return Err(ValidationError::NonPositiveValue { field: "price" });
        }

        let mut observation = Self {
            symbol: fields.symbol,
            price,
            volume: round_to(fields.volume, VOLUME_PRECISION),
            change_24h: fields.change_24h,
            timestamp: fields.timestamp,
            market_cap: fields.market_cap,
            rank: fields.rank,
            volatility_index: fields.volatility_index,
            metadata: ObservationMetadata {
                data_quality_score: 0.0,
                extra: BTreeMap::new(),
            },
        };
        observation.metadata.data_quality_score = observation.quality_score();
        Ok(observation)
    }

    /// Attach a free-form metadata entry; the quality score is not affected.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn change_24h(&self) -> f64 {
        self.change_24h
    }

    pub fn timestamp(&self) -> UtcDateTime {
        self.timestamp
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.market_cap
    }

    pub fn rank(&self) -> Option<u32> {
        self.rank
    }

    pub fn volatility_index(&self) -> Option<f64> {
        self.volatility_index
    }

    pub fn metadata(&self) -> &ObservationMetadata {
        &self.metadata
    }

    pub fn data_quality_score(&self) -> f64 {
        self.metadata.data_quality_score
    }

    // Completeness minus plausibility penalties, in [0, 1].
    fn quality_score(&self) -> f64 {
        let mut score = 1.0;
        if self.volume == 0.0 {
            score -= 0.25;
        }
        let missing = [
            self.market_cap.is_none(),
            self.rank.is_none(),
            self.volatility_index.is_none(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count();
        score -= 0.1 * missing as f64;
        if self.change_24h.abs() > 50.0 {
            score -= 0.2;
        }
        score.clamp(0.0, 1.0)
    }
}

/// OHLCV candle for one symbol and interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub interval: Interval,
    pub timestamp: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub indicators: BTreeMap<String, f64>,
}

impl Candle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        timestamp: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        validate_positive("open", open)?;
        validate_positive("high", high)?;
        validate_positive("low", low)?;
        validate_positive("close", close)?;
        validate_non_negative("volume", volume)?;

        if high < low {
            return Err(ValidationError::InvalidCandleRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidCandleBounds);
        }

        Ok(Self {
            symbol,
            interval,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            indicators: BTreeMap::new(),
        })
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }
}

/// Timestamp-ordered candles for one symbol and interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalSeries {
    symbol: Symbol,
    interval: Interval,
    candles: Vec<Candle>,
}

impl HistoricalSeries {
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        candles: Vec<Candle>,
    ) -> Result<Self, ValidationError> {
        let consistent = candles
            .iter()
            .all(|candle| candle.symbol == symbol && candle.interval == interval);
        let ordered = candles
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp);
        if !consistent || !ordered {
            return Err(ValidationError::InconsistentSeries);
        }

        Ok(Self {
            symbol,
            interval,
            candles,
        })
    }

    pub fn empty(symbol: Symbol, interval: Interval) -> Self {
        Self {
            symbol,
            interval,
            candles: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// The most recent `n` candles (all of them when `n` exceeds the length).
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|candle| candle.close).collect()
    }

    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
