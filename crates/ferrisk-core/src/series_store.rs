use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::BatchSettings;
use crate::exchange_client::{CandleRequest, ExchangeClient, ExchangeError};
use crate::{
    Candle, ExchangeId, HistoricalSeries, Interval, IntervalUnit, Symbol, UtcDateTime,
    ValidationError,
};

/// Largest number of candles one klines request returns.
pub const MAX_CANDLES_PER_REQUEST: usize = 1_000;

/// 1970-01-01 was a Thursday; weekly buckets start on the following Monday.
const WEEK_ANCHOR_MILLIS: i64 = 4 * 86_400_000;

/// Which candles to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRange {
    /// The most recent `n` candles.
    Limit(usize),
    /// Every candle opening in `[start, end]`.
    Between { start: UtcDateTime, end: UtcDateTime },
}

/// Anything that can produce a candle series for a symbol.
pub trait CandleSource: Send + Sync {
    fn fetch_series<'a>(
        &'a self,
        symbol: &'a Symbol,
        interval: Interval,
        range: SeriesRange,
    ) -> Pin<Box<dyn Future<Output = Result<HistoricalSeries, ExchangeError>> + Send + 'a>>;
}

/// Column reducer used when folding candles into a coarser bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    First,
    Last,
    Max,
    Min,
    Sum,
    Mean,
}

impl Reducer {
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            Self::First => values.first().copied().unwrap_or(f64::NAN),
            Self::Last => values.last().copied().unwrap_or(f64::NAN),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Sum => values.iter().sum(),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
        }
    }
}

/// Per-column reducers; the default is OHLC first/max/min/last and summed volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSpec {
    pub open: Reducer,
    pub high: Reducer,
    pub low: Reducer,
    pub close: Reducer,
    pub volume: Reducer,
}

impl Default for AggregationSpec {
    fn default() -> Self {
        Self {
            open: Reducer::First,
            high: Reducer::Max,
            low: Reducer::Min,
            close: Reducer::Last,
            volume: Reducer::Sum,
        }
    }
}

/// Result of [`HistoricalSeriesStore::batch_update`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUpdateSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub timestamp: UtcDateTime,
}

/// Candle access on top of [`ExchangeClient`].
pub struct HistoricalSeriesStore {
    client: Arc<ExchangeClient>,
    exchange: ExchangeId,
    batch: BatchSettings,
    page_size: usize,
}

impl HistoricalSeriesStore {
    pub fn new(client: Arc<ExchangeClient>, batch: BatchSettings) -> Self {
        Self {
            client,
            exchange: ExchangeId::Binance,
            batch,
            page_size: MAX_CANDLES_PER_REQUEST,
        }
    }

    pub fn with_exchange(mut self, exchange: ExchangeId) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_CANDLES_PER_REQUEST);
        self
    }

    pub fn client(&self) -> &Arc<ExchangeClient> {
        &self.client
    }

    pub async fn fetch(
        &self,
        symbol: &Symbol,
        interval: Interval,
        range: SeriesRange,
    ) -> Result<HistoricalSeries, ExchangeError> {
        match range {
            SeriesRange::Limit(limit) => self.fetch_latest(symbol, interval, limit).await,
            SeriesRange::Between { start, end } => {
                self.fetch_between(symbol, interval, start, end).await
            }
        }
    }

    /// Pages backwards from now until `limit` candles are collected or history runs out.
    async fn fetch_latest(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: usize,
    ) -> Result<HistoricalSeries, ExchangeError> {
        if limit == 0 {
            return Err(ValidationError::ZeroLimit.into());
        }

        let mut collected: Vec<Candle> = Vec::new();
        let mut end: Option<UtcDateTime> = None;
        while collected.len() < limit {
            let page_limit = (limit - collected.len()).min(self.page_size);
            let request = CandleRequest::new(symbol.clone(), interval)
                .on(self.exchange)
                .with_limit(page_limit)
                .with_range(None, end);
            let page = self.client.fetch_candles(&request).await?.into_candles();
            let exhausted = page.len() < page_limit;

            let Some(first) = page.first() else { break };
            end = Some(UtcDateTime::from_unix_millis(first.timestamp.unix_millis() - 1)?);
            debug!(%symbol, %interval, page = page.len(), "fetched candle page");

            collected.splice(0..0, page);
            if exhausted {
                break;
            }
        }

        let skip = collected.len().saturating_sub(limit);
        into_series(symbol, interval, collected.into_iter().skip(skip).collect())
    }

    /// Pages forward through `[start, end]`, both ends inclusive.
    async fn fetch_between(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> Result<HistoricalSeries, ExchangeError> {
        if start >= end {
            return Err(ValidationError::InvalidTimeRange.into());
        }

        let mut collected: Vec<Candle> = Vec::new();
        let mut cursor = start;
        loop {
            let request = CandleRequest::new(symbol.clone(), interval)
                .on(self.exchange)
                .with_limit(self.page_size)
                .with_range(Some(cursor), Some(end));
            let page = self.client.fetch_candles(&request).await?.into_candles();
            let exhausted = page.len() < self.page_size;

            let Some(last) = page.last() else { break };
            let next = UtcDateTime::from_unix_millis(last.timestamp.unix_millis() + interval.millis())?;
            debug!(%symbol, %interval, page = page.len(), "fetched candle page");

            collected.extend(page);
            if exhausted || next > end || next <= cursor {
                break;
            }
            cursor = next;
        }

        into_series(symbol, interval, collected)
    }

    /// Fetches tickers for `symbols` in fixed-size batches, strictly in order. A failed batch is
    /// recorded and the remaining batches still run.
    pub async fn batch_update(&self, symbols: &[Symbol]) -> Result<BatchUpdateSummary, ValidationError> {
        if symbols.is_empty() {
            return Err(ValidationError::EmptySymbolList);
        }

        let mut summary = BatchUpdateSummary {
            total: symbols.len(),
            successful: 0,
            failed: 0,
            errors: Vec::new(),
            timestamp: UtcDateTime::now(),
        };

        let batches: Vec<&[Symbol]> = symbols.chunks(self.batch.size.max(1)).collect();
        let batch_count = batches.len();
        for (index, batch) in batches.into_iter().enumerate() {
            match self.client.fetch_ticker(batch, self.exchange).await {
                Ok(observations) => {
                    summary.successful += observations.len();
                    summary.failed += batch.len().saturating_sub(observations.len());
                }
                Err(err) => {
                    error!(batch = index, size = batch.len(), error = %err, "batch update failed");
                    summary.failed += batch.len();
                    summary.errors.push(err.to_string());
                }
            }

            if index + 1 < batch_count && !self.batch.delay.is_zero() {
                tokio::time::sleep(self.batch.delay).await;
            }
        }

        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "batch update finished"
        );
        Ok(summary)
    }
}

impl CandleSource for HistoricalSeriesStore {
    fn fetch_series<'a>(
        &'a self,
        symbol: &'a Symbol,
        interval: Interval,
        range: SeriesRange,
    ) -> Pin<Box<dyn Future<Output = Result<HistoricalSeries, ExchangeError>> + Send + 'a>> {
        Box::pin(self.fetch(symbol, interval, range))
    }
}

fn into_series(
    symbol: &Symbol,
    interval: Interval,
    mut candles: Vec<Candle>,
) -> Result<HistoricalSeries, ExchangeError> {
    candles.sort_by_key(|candle| candle.timestamp);
    candles.dedup_by_key(|candle| candle.timestamp);
    Ok(HistoricalSeries::new(symbol.clone(), interval, candles)?)
}

fn column(members: &[&Candle], pick: impl Fn(&Candle) -> f64) -> Vec<f64> {
    members.iter().map(|candle| pick(candle)).collect()
}

/// Start of the `target` bucket containing `timestamp_ms`.
fn bucket_start(timestamp_ms: i64, target: Interval) -> i64 {
    let width = target.millis();
    let anchor = if target.unit() == IntervalUnit::Week {
        WEEK_ANCHOR_MILLIS
    } else {
        0
    };
    (timestamp_ms - anchor).div_euclid(width) * width + anchor
}

/// Folds `series` into `target` buckets. Empty buckets produce no candle. With
/// `volume_weighted`, each derived candle carries the cumulative VWAP as indicator `vwap`.
pub fn aggregate(
    series: &HistoricalSeries,
    target: Interval,
    spec: Option<&AggregationSpec>,
    volume_weighted: bool,
) -> Result<HistoricalSeries, ValidationError> {
    let source = series.interval();
    if !target.is_multiple_of(source) {
        return Err(ValidationError::InvalidAggregation {
            from: source.to_string(),
            to: target.to_string(),
        });
    }
    let spec = spec.copied().unwrap_or_default();

    let mut buckets: Vec<(i64, Vec<&Candle>)> = Vec::new();
    for candle in series.candles() {
        let start = bucket_start(candle.timestamp.unix_millis(), target);
        match buckets.last_mut() {
            Some((bucket, members)) if *bucket == start => members.push(candle),
            _ => buckets.push((start, vec![candle])),
        }
    }

    let mut cumulative_value = 0.0;
    let mut cumulative_volume = 0.0;
    let mut derived = Vec::with_capacity(buckets.len());
    for (start, members) in buckets {
        let mut candle = Candle::new(
            series.symbol().clone(),
            target,
            UtcDateTime::from_unix_millis(start)?,
            spec.open.apply(&column(&members, |c| c.open)),
            spec.high.apply(&column(&members, |c| c.high)),
            spec.low.apply(&column(&members, |c| c.low)),
            spec.close.apply(&column(&members, |c| c.close)),
            spec.volume.apply(&column(&members, |c| c.volume)),
        )?;

        if volume_weighted {
            cumulative_value += candle.close * candle.volume;
            cumulative_volume += candle.volume;
            if cumulative_volume > 0.0 {
                candle = candle.with_indicator("vwap", cumulative_value / cumulative_volume);
            }
        }
        derived.push(candle);
    }

    HistoricalSeries::new(series.symbol().clone(), target, derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(start_ms: i64, closes: &[(f64, f64)]) -> HistoricalSeries {
        let symbol = Symbol::parse("BTCUSDT").expect("valid");
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, (close, volume))| {
                Candle::new(
                    symbol.clone(),
                    Interval::ONE_HOUR,
                    UtcDateTime::from_unix_millis(start_ms + i as i64 * 3_600_000).expect("valid"),
                    *close,
                    close + 1.0,
                    close - 1.0,
                    *close,
                    *volume,
                )
                .expect("valid candle")
            })
            .collect();
        HistoricalSeries::new(symbol, Interval::ONE_HOUR, candles).expect("valid series")
    }

    #[test]
    fn single_candle_aggregates_to_itself() {
        let series = hourly(0, &[(100.0, 5.0)]);
        let derived = aggregate(&series, Interval::ONE_HOUR, None, false).expect("aggregate");

        assert_eq!(derived.candles(), series.candles());
    }

    #[test]
    fn default_reducers_fold_ohlcv() {
        let series = hourly(0, &[(100.0, 1.0), (104.0, 2.0), (102.0, 3.0), (99.0, 4.0)]);
        let four_hours: Interval = "4h".parse().expect("valid");
        let derived = aggregate(&series, four_hours, None, false).expect("aggregate");

        assert_eq!(derived.len(), 1);
        let candle = &derived.candles()[0];
        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 105.0);
        assert_eq!(candle.low, 98.0);
        assert_eq!(candle.close, 99.0);
        assert_eq!(candle.volume, 10.0);
        assert_eq!(candle.indicator("vwap"), None);
    }

    #[test]
    fn vwap_is_cumulative_across_buckets() {
        let series = hourly(0, &[(100.0, 1.0), (110.0, 1.0), (120.0, 3.0), (130.0, 1.0)]);
        let two_hours: Interval = "2h".parse().expect("valid");
        let derived = aggregate(&series, two_hours, None, true).expect("aggregate");

        let vwap: Vec<f64> = derived
            .candles()
            .iter()
            .map(|c| c.indicator("vwap").expect("vwap"))
            .collect();
        assert_eq!(vwap[0], 110.0);
        assert_eq!(vwap[1], (110.0 * 2.0 + 130.0 * 4.0) / 6.0);
    }

    #[test]
    fn caller_reducers_override_defaults() {
        let series = hourly(0, &[(100.0, 1.0), (104.0, 3.0)]);
        let spec = AggregationSpec {
            volume: Reducer::Mean,
            ..AggregationSpec::default()
        };
        let two_hours: Interval = "2h".parse().expect("valid");
        let derived = aggregate(&series, two_hours, Some(&spec), false).expect("aggregate");

        assert_eq!(derived.candles()[0].volume, 2.0);
    }

    #[test]
    fn empty_buckets_are_skipped() {
        let symbol = Symbol::parse("ETHUSDT").expect("valid");
        let candle = |hour: i64| {
            Candle::new(
                symbol.clone(),
                Interval::ONE_HOUR,
                UtcDateTime::from_unix_millis(hour * 3_600_000).expect("valid"),
                10.0,
                11.0,
                9.0,
                10.0,
                1.0,
            )
            .expect("valid")
        };
        let series =
            HistoricalSeries::new(symbol.clone(), Interval::ONE_HOUR, vec![candle(0), candle(9)]).expect("series");
        let four_hours: Interval = "4h".parse().expect("valid");

        let derived = aggregate(&series, four_hours, None, false).expect("aggregate");
        let starts: Vec<i64> = derived.candles().iter().map(|c| c.timestamp.unix_millis()).collect();
        assert_eq!(starts, vec![0, 8 * 3_600_000]);
    }

    #[test]
    fn weekly_buckets_start_on_monday() {
        // 1970-01-08 (Thursday) falls in the week starting Monday 1970-01-05.
        assert_eq!(bucket_start(7 * 86_400_000, Interval::ONE_WEEK), 4 * 86_400_000);
        assert_eq!(bucket_start(3 * 86_400_000, Interval::ONE_WEEK), -3 * 86_400_000);
        assert_eq!(bucket_start(26 * 3_600_000, Interval::ONE_DAY), 86_400_000);
    }

    #[test]
    fn rejects_finer_or_misaligned_targets() {
        let series = hourly(0, &[(100.0, 1.0)]);
        let err = aggregate(&series, Interval::ONE_MINUTE, None, true).expect_err("finer");
        assert!(matches!(err, ValidationError::InvalidAggregation { .. }));

        let ninety: Interval = "90m".parse().expect("valid");
        assert!(aggregate(&series, ninety, None, true).is_err());
    }
}
