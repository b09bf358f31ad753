//! Deterministic candle generator for offline runs.

use std::future::Future;
use std::pin::Pin;

use crate::exchange_client::ExchangeError;
use crate::series_store::{CandleSource, SeriesRange};
use crate::{Candle, HistoricalSeries, Interval, Symbol, UtcDateTime, ValidationError};

/// Seeded geometric random walk implementing [`CandleSource`].
///
/// The same seed, symbol and range always produce the same candles.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticCandleSource {
    seed: u64,
    start_price: f64,
    /// Per-candle log-return standard deviation.
    volatility: f64,
    /// Per-candle log-return mean.
    drift: f64,
    base_volume: f64,
    anchor: Option<UtcDateTime>,
}

impl Default for SyntheticCandleSource {
    fn default() -> Self {
        Self::new(42)
    }
}

impl SyntheticCandleSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_price: 100.0,
            volatility: 0.02,
            drift: 0.0,
            base_volume: 1_000.0,
            anchor: None,
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    pub fn with_walk(mut self, drift: f64, volatility: f64) -> Self {
        self.drift = drift;
        self.volatility = volatility.abs();
        self
    }

    /// Fixes the time of the most recent candle; defaults to now.
    pub fn with_anchor(mut self, anchor: UtcDateTime) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn generate(
        &self,
        symbol: &Symbol,
        interval: Interval,
        range: SeriesRange,
    ) -> Result<HistoricalSeries, ValidationError> {
        let step = interval.millis();
        let (first_open, count) = match range {
            SeriesRange::Limit(0) => return Err(ValidationError::ZeroLimit),
            SeriesRange::Limit(count) => {
                let anchor = self.anchor.unwrap_or_else(UtcDateTime::now).unix_millis();
                let last_open = anchor.div_euclid(step) * step;
                (last_open - (count as i64 - 1) * step, count)
            }
            SeriesRange::Between { start, end } => {
                if start >= end {
                    return Err(ValidationError::InvalidTimeRange);
                }
                let first = start.unix_millis().div_euclid(step) * step;
                let first = if first < start.unix_millis() { first + step } else { first };
                let count = ((end.unix_millis() - first).div_euclid(step) + 1).max(0) as usize;
                (first, count)
            }
        };

        let mut rng = fastrand::Rng::with_seed(self.seed ^ symbol_salt(symbol));
        let mut close = self.start_price;
        let mut candles = Vec::with_capacity(count);
        for index in 0..count {
            let open = close;
            let shock = self.drift + self.volatility * standard_normal(&mut rng);
            close = (open * shock.exp()).max(f64::MIN_POSITIVE);
            let wick = self.volatility * 0.5 * rng.f64();
            let high = open.max(close) * (1.0 + wick);
            let low = open.min(close) * (1.0 - wick).max(0.5);
            let volume = self.base_volume * (0.5 + rng.f64());

            candles.push(Candle::new(
                symbol.clone(),
                interval,
                UtcDateTime::from_unix_millis(first_open + index as i64 * step)?,
                open,
                high,
                low,
                close,
                volume,
            )?);
        }

        HistoricalSeries::new(symbol.clone(), interval, candles)
    }
}

impl CandleSource for SyntheticCandleSource {
    fn fetch_series<'a>(
        &'a self,
        symbol: &'a Symbol,
        interval: Interval,
        range: SeriesRange,
    ) -> Pin<Box<dyn Future<Output = Result<HistoricalSeries, ExchangeError>> + Send + 'a>> {
        Box::pin(async move {
            self.generate(symbol, interval, range)
                .map_err(ExchangeError::from)
        })
    }
}

/// FNV-1a over the symbol so each symbol walks independently.
fn symbol_salt(symbol: &Symbol) -> u64 {
    symbol
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        })
}

/// Box-Muller transform.
fn standard_normal(rng: &mut fastrand::Rng) -> f64 {
    let u1 = rng.f64().max(f64::MIN_POSITIVE);
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> UtcDateTime {
        UtcDateTime::from_unix_millis(1_700_000_000_000).expect("valid")
    }

    #[test]
    fn same_seed_reproduces_the_series() {
        let symbol = Symbol::parse("BTCUSDT").expect("valid");
        let source = SyntheticCandleSource::new(7).with_anchor(anchor());

        let first = source
            .generate(&symbol, Interval::ONE_DAY, SeriesRange::Limit(90))
            .expect("series");
        let second = source
            .generate(&symbol, Interval::ONE_DAY, SeriesRange::Limit(90))
            .expect("series");

        assert_eq!(first, second);
        assert_eq!(first.len(), 90);
        let last = first.last().expect("non-empty").timestamp.unix_millis();
        assert_eq!(last % Interval::ONE_DAY.millis(), 0);
        assert!(last <= anchor().unix_millis());
    }

    #[test]
    fn time_range_is_inclusive_and_bucket_aligned() {
        let symbol = Symbol::parse("ETHUSDT").expect("valid");
        let source = SyntheticCandleSource::new(1);
        let start = UtcDateTime::from_unix_millis(30 * 60_000).expect("valid");
        let end = UtcDateTime::from_unix_millis(5 * 3_600_000).expect("valid");

        let series = source
            .generate(
                &symbol,
                Interval::ONE_HOUR,
                SeriesRange::Between { start, end },
            )
            .expect("series");

        let hours: Vec<i64> = series
            .candles()
            .iter()
            .map(|c| c.timestamp.unix_millis() / 3_600_000)
            .collect();
        assert_eq!(hours, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn flat_walk_keeps_price_constant() {
        let symbol = Symbol::parse("USDC").expect("valid");
        let source = SyntheticCandleSource::new(3)
            .with_walk(0.0, 0.0)
            .with_anchor(anchor());

        let series = source
            .generate(&symbol, Interval::ONE_DAY, SeriesRange::Limit(10))
            .expect("series");
        assert!(series.closes().iter().all(|close| *close == 100.0));
    }
}
