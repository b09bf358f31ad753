use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use ferrisk_core::{CandleSource, HistoricalSeries, Interval, SeriesRange, Symbol, UtcDateTime};
use serde::{Deserialize, Serialize};
use ta::indicators::{MovingAverageConvergenceDivergence, SimpleMovingAverage};
use ta::Next;
use tracing::{debug, info};

use crate::error::AnalyticsError;
use crate::stats;

pub const DEFAULT_TREND_WINDOW: usize = 30;
pub const RSI_PERIOD: usize = 14;
pub const MACD_PERIODS: (usize, usize, usize) = (12, 26, 9);
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;
const SHORT_MA: usize = 10;
const LONG_MA: usize = 30;
/// Candle count at which the analysis quality saturates.
const FULL_QUALITY_POINTS: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Rsi,
    Macd,
    Bollinger,
}

impl Indicator {
    pub const ALL: [Self; 3] = [Self::Rsi, Self::Macd, Self::Bollinger];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rsi => "rsi",
            Self::Macd => "macd",
            Self::Bollinger => "bollinger",
        }
    }
}

impl Display for Indicator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Indicator {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rsi" => Ok(Self::Rsi),
            "macd" => Ok(Self::Macd),
            "bollinger" | "bb" => Ok(Self::Bollinger),
            _ => Err(AnalyticsError::InvalidParameter {
                name: "indicator",
                value: value.to_owned(),
                expected: "one of rsi, macd, bollinger",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdValues {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Requested indicators; `None` when the series is too short for the indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TechnicalIndicators {
    #[serde(skip_serializing_if = "Requested::skip")]
    pub rsi: Requested<f64>,
    #[serde(skip_serializing_if = "Requested::skip")]
    pub macd: Requested<MacdValues>,
    #[serde(skip_serializing_if = "Requested::skip")]
    pub bollinger: Requested<BollingerBands>,
}

/// Distinguishes an indicator that was not asked for from one that could not be computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Requested<T> {
    Skipped,
    Value(Option<T>),
}

impl<T> Default for Requested<T> {
    fn default() -> Self {
        Self::Skipped
    }
}

impl<T> Requested<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(Some(value)) => Some(value),
            _ => None,
        }
    }

    pub fn is_requested(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    fn skip(&self) -> bool {
        !self.is_requested()
    }
}

impl<T: Serialize> Serialize for Requested<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(Some(value)) => value.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Momentum {
    pub momentum_1d: Option<f64>,
    pub momentum_7d: Option<f64>,
    pub momentum_30d: Option<f64>,
    pub acceleration: Option<f64>,
    /// Annualized standard deviation of simple returns.
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSignal {
    pub direction: TrendDirection,
    pub strength: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendMetadata {
    pub analysis_quality: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub symbol: Symbol,
    pub timestamp: UtcDateTime,
    pub window_size: usize,
    pub trend: TrendSignal,
    pub momentum: Momentum,
    pub technical_indicators: TechnicalIndicators,
    pub metadata: TrendMetadata,
}

/// Technical indicators, momentum and a directional signal over recent daily candles.
pub struct TrendAnalyticsEngine {
    source: Arc<dyn CandleSource>,
}

impl TrendAnalyticsEngine {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self { source }
    }

    pub async fn analyze(
        &self,
        symbol: &Symbol,
        window_size: usize,
        indicators: &[Indicator],
    ) -> Result<TrendReport, AnalyticsError> {
        validate_window(window_size)?;
        let series = self
            .source
            .fetch_series(symbol, Interval::ONE_DAY, SeriesRange::Limit(window_size))
            .await?;
        debug!(%symbol, candles = series.len(), "fetched series for trend analysis");

        let report = analyze_series(&series, window_size, indicators)?;
        info!(
            %symbol,
            direction = ?report.trend.direction,
            confidence = report.trend.confidence,
            "trend report computed"
        );
        Ok(report)
    }
}

fn validate_window(window_size: usize) -> Result<(), AnalyticsError> {
    if window_size == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "window_size",
            value: window_size.to_string(),
            expected: "a positive number of days",
        });
    }
    Ok(())
}

/// Analyzes an already fetched series. An empty `indicators` slice means all of them.
pub fn analyze_series(
    series: &HistoricalSeries,
    window_size: usize,
    indicators: &[Indicator],
) -> Result<TrendReport, AnalyticsError> {
    validate_window(window_size)?;
    if series.is_empty() {
        return Err(AnalyticsError::insufficient(
            series.symbol(),
            "no historical candles available",
        ));
    }

    let requested = if indicators.is_empty() {
        &Indicator::ALL[..]
    } else {
        indicators
    };
    let closes = series.closes();
    let technical_indicators = technical_indicators(&closes, requested)?;
    let trend = trend_signal(&closes, &technical_indicators);

    Ok(TrendReport {
        symbol: series.symbol().clone(),
        timestamp: UtcDateTime::now(),
        window_size,
        trend,
        momentum: momentum(&closes),
        technical_indicators,
        metadata: TrendMetadata {
            analysis_quality: (closes.len() as f64 / FULL_QUALITY_POINTS).min(1.0),
            data_points: closes.len(),
        },
    })
}

fn technical_indicators(
    closes: &[f64],
    requested: &[Indicator],
) -> Result<TechnicalIndicators, AnalyticsError> {
    let mut out = TechnicalIndicators::default();
    for indicator in requested {
        match indicator {
            Indicator::Rsi => out.rsi = Requested::Value(rsi(closes, RSI_PERIOD)),
            Indicator::Macd => out.macd = Requested::Value(macd(closes)?),
            Indicator::Bollinger => {
                out.bollinger =
                    Requested::Value(bollinger(closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH))
            }
        }
    }
    Ok(out)
}

/// Simple-average RSI over the last `period` price changes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }
    let deltas: Vec<f64> = closes[closes.len() - period - 1..]
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect();
    let gain = deltas.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
    let loss = deltas.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;

    if loss == 0.0 {
        return Some(if gain > 0.0 { 100.0 } else { 50.0 });
    }
    Some(100.0 - 100.0 / (1.0 + gain / loss))
}

/// MACD(12, 26, 9) on EMAs seeded with the first close.
pub fn macd(closes: &[f64]) -> Result<Option<MacdValues>, AnalyticsError> {
    let (fast, slow, signal) = MACD_PERIODS;
    if closes.len() < slow {
        return Ok(None);
    }
    let mut indicator =
        MovingAverageConvergenceDivergence::new(fast, slow, signal).map_err(|err| {
            AnalyticsError::InvalidParameter {
                name: "macd periods",
                value: format!("{err:?}"),
                expected: "positive periods",
            }
        })?;

    let last = closes
        .iter()
        .map(|close| indicator.next(*close))
        .last()
        .map(|output| MacdValues {
            macd: output.macd,
            signal: output.signal,
            histogram: output.histogram,
        });
    Ok(last)
}

/// Bands at `width` sample standard deviations around the `period` SMA.
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Option<BollingerBands> {
    if period < 2 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let middle = stats::mean(window)?;
    let std = stats::sample_std(window)?;
    Some(BollingerBands {
        middle,
        upper: middle + width * std,
        lower: middle - width * std,
    })
}

pub fn momentum(closes: &[f64]) -> Momentum {
    let returns = stats::pct_change(closes);
    let acceleration: Vec<f64> = returns.windows(2).map(|w| w[1] - w[0]).collect();
    Momentum {
        momentum_1d: returns.last().copied(),
        momentum_7d: stats::tail_mean(&returns, 7),
        momentum_30d: stats::tail_mean(&returns, 30),
        acceleration: stats::tail_mean(&acceleration, 7),
        volatility: stats::sample_std(&returns).map(|std| std * 252_f64.sqrt()),
    }
}

fn simple_moving_average(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }
    let mut sma = SimpleMovingAverage::new(period).ok()?;
    closes.iter().map(|close| sma.next(*close)).last()
}

/// Direction from price against MA(10) and MA(30); confidence from RSI and MACD signs.
pub fn trend_signal(closes: &[f64], indicators: &TechnicalIndicators) -> TrendSignal {
    let price = closes.last().copied();
    let short = simple_moving_average(closes, SHORT_MA);
    let long = simple_moving_average(closes, LONG_MA);

    let (direction, strength) = match (price, short, long) {
        (Some(price), Some(short), Some(long)) if price > short && short > long => (
            TrendDirection::Bullish,
            ((price - long) / long * 100.0).min(100.0),
        ),
        (Some(price), Some(short), Some(long)) if price < short && short < long => (
            TrendDirection::Bearish,
            ((long - price) / long * 100.0).min(100.0),
        ),
        _ => (TrendDirection::Neutral, 0.0),
    };

    let mut signals = Vec::with_capacity(2);
    if let Some(rsi) = indicators.rsi.value() {
        signals.push(if *rsi > 50.0 { 1.0 } else { -1.0 });
    }
    if let Some(macd) = indicators.macd.value() {
        signals.push(if macd.histogram > 0.0 { 1.0 } else { -1.0 });
    }
    let confidence = if signals.is_empty() {
        0.5
    } else {
        (signals.iter().sum::<f64>() / signals.len() as f64).abs()
    };

    TrendSignal {
        direction,
        strength,
        confidence,
    }
}
