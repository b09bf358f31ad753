use std::collections::BTreeMap;
use std::sync::Arc;

use ferrisk_core::{
    CacheMode, CandleSource, FeatureColumn, HistoricalSeries, InMemoryTtlCache, Interval,
    SeriesRange, Settings, Symbol, TtlCache, UtcDateTime,
};
use serde::Serialize;
use tracing::{debug, error, info};

use super::predictor::{
    build_feature_window, ConfidenceLevel, Horizon, Predictor, PredictorOutput,
};
use crate::error::AnalyticsError;
use crate::stats;

const FULL_QUALITY_POINTS: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredictionKey {
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalBounds {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePrediction {
    pub mean: f64,
    pub confidence_intervals: IntervalBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub confidence_level: ConfidenceLevel,
    pub timestamp: UtcDateTime,
    pub predictions: PricePrediction,
    /// Predictor metrics merged with the quality metrics computed here.
    pub metrics: BTreeMap<String, f64>,
}

pub type PredictionCache = Arc<dyn TtlCache<PredictionKey, PredictionResult>>;

/// Runs a [`Predictor`] over recent daily candles and caches the results briefly.
pub struct PredictionOrchestrator {
    source: Arc<dyn CandleSource>,
    predictor: Arc<dyn Predictor>,
    cache: PredictionCache,
    columns: Vec<FeatureColumn>,
    lookback_days: usize,
    write_on_bypass: bool,
}

impl PredictionOrchestrator {
    pub fn new(
        source: Arc<dyn CandleSource>,
        predictor: Arc<dyn Predictor>,
        settings: &Settings,
    ) -> Self {
        Self {
            source,
            predictor,
            cache: Arc::new(InMemoryTtlCache::new(settings.cache.ttl)),
            columns: settings.ml.feature_columns.clone(),
            lookback_days: settings.ml.lookback_days.max(1),
            write_on_bypass: settings.cache.write_on_bypass,
        }
    }

    pub fn with_cache(mut self, cache: PredictionCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub async fn predict(
        &self,
        symbol: &Symbol,
        horizon: u32,
        confidence: f64,
        use_cache: bool,
    ) -> Result<PredictionResult, AnalyticsError> {
        let key = PredictionKey {
            symbol: symbol.clone(),
            horizon: Horizon::try_from(horizon)?,
            confidence: ConfidenceLevel::try_from(confidence)?,
        };
        let mode = CacheMode::from_flags(use_cache, self.write_on_bypass);

        if mode.reads() {
            if let Some(hit) = self.cache.get(&key).await {
                debug!(%symbol, horizon, confidence, "prediction served from cache");
                return Ok(hit);
            }
        }

        let result = self.compute(&key).await.inspect_err(|err| {
            error!(%symbol, horizon, confidence, error = %err, "prediction failed");
        })?;

        if mode.writes() {
            self.cache.put(key, result.clone()).await;
        }
        Ok(result)
    }

    async fn compute(&self, key: &PredictionKey) -> Result<PredictionResult, AnalyticsError> {
        let series = self
            .source
            .fetch_series(
                &key.symbol,
                Interval::ONE_DAY,
                SeriesRange::Limit(self.lookback_days),
            )
            .await?;
        if series.is_empty() {
            return Err(AnalyticsError::insufficient(
                &key.symbol,
                "no historical candles available",
            ));
        }

        let window = build_feature_window(&series, &self.columns)?;
        let output = self.predictor.predict(&window, key.horizon, key.confidence)?;
        let (mean, interval) = output.terminal()?;

        let mut metrics = output.metrics.clone();
        metrics.extend(quality_metrics(&series, &output));

        info!(
            symbol = %key.symbol,
            horizon = key.horizon.days(),
            mean,
            interval,
            "prediction computed"
        );
        Ok(PredictionResult {
            symbol: key.symbol.clone(),
            horizon: key.horizon,
            confidence_level: key.confidence,
            timestamp: UtcDateTime::now(),
            predictions: PricePrediction {
                mean,
                confidence_intervals: IntervalBounds {
                    lower: mean - interval,
                    upper: mean + interval,
                },
            },
            metrics,
        })
    }
}

fn quality_metrics(series: &HistoricalSeries, output: &PredictorOutput) -> [(String, f64); 4] {
    let returns = stats::pct_change(&series.closes());
    [
        (
            "historical_volatility".to_owned(),
            stats::sample_std(&returns).unwrap_or_default(),
        ),
        (
            "prediction_std".to_owned(),
            stats::population_std(&output.mean).unwrap_or_default(),
        ),
        (
            "confidence_interval_width".to_owned(),
            stats::mean(&output.interval).unwrap_or_default(),
        ),
        (
            "data_quality_score".to_owned(),
            (series.len() as f64 / FULL_QUALITY_POINTS).min(1.0),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use ferrisk_core::{ManualClock, SyntheticCandleSource};
    use ndarray::Array3;

    use super::*;
    use crate::prediction::PredictorError;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Predictor for Counting {
        fn predict(
            &self,
            window: &Array3<f64>,
            _horizon: Horizon,
            _confidence: ConfidenceLevel,
        ) -> Result<PredictorOutput, PredictorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let last = window[[0, window.shape()[1] - 1, 0]];
            Ok(PredictorOutput {
                mean: vec![last, last + 2.0],
                interval: vec![1.0, 3.0],
                metrics: BTreeMap::from([("model".to_owned(), 1.0)]),
            })
        }
    }

    fn orchestrator(
        predictor: Arc<Counting>,
        settings: &Settings,
    ) -> (PredictionOrchestrator, ManualClock) {
        let clock = ManualClock::new();
        let source = SyntheticCandleSource::new(5)
            .with_anchor(UtcDateTime::from_unix_millis(1_700_000_000_000).expect("valid"));
        let orchestrator = PredictionOrchestrator::new(Arc::new(source), predictor, settings)
            .with_cache(Arc::new(InMemoryTtlCache::with_clock(
                settings.cache.ttl,
                Arc::new(clock.clone()),
            )));
        (orchestrator, clock)
    }

    fn btc() -> Symbol {
        Symbol::parse("BTC").expect("valid")
    }

    #[tokio::test]
    async fn cached_prediction_skips_predictor() {
        let predictor = Arc::new(Counting::default());
        let (orchestrator, _clock) = orchestrator(predictor.clone(), &Settings::default());

        let first = orchestrator.predict(&btc(), 7, 0.95, true).await.expect("first");
        let second = orchestrator.predict(&btc(), 7, 0.95, true).await.expect("second");

        assert_eq!(first, second);
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_recomputed() {
        let predictor = Arc::new(Counting::default());
        let (orchestrator, clock) = orchestrator(predictor.clone(), &Settings::default());

        orchestrator.predict(&btc(), 1, 0.68, true).await.expect("first");
        clock.advance(Duration::from_secs(300));
        orchestrator.predict(&btc(), 1, 0.68, true).await.expect("second");

        assert_eq!(predictor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bypass_respects_write_setting() {
        let mut settings = Settings::default();
        settings.cache.write_on_bypass = false;
        let predictor = Arc::new(Counting::default());
        let (orchestrator, _clock) = orchestrator(predictor.clone(), &settings);

        orchestrator.predict(&btc(), 30, 0.99, false).await.expect("bypass");
        orchestrator.predict(&btc(), 30, 0.99, true).await.expect("cached");

        assert_eq!(predictor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn result_uses_terminal_step_and_quality_metrics() {
        let predictor = Arc::new(Counting::default());
        let (orchestrator, _clock) = orchestrator(predictor, &Settings::default());

        let result = orchestrator.predict(&btc(), 90, 0.95, true).await.expect("result");

        let bounds = result.predictions.confidence_intervals;
        assert!((bounds.upper - result.predictions.mean - 3.0).abs() < 1e-9);
        assert!((result.predictions.mean - bounds.lower - 3.0).abs() < 1e-9);
        assert_eq!(result.metrics["model"], 1.0);
        assert!((result.metrics["prediction_std"] - 1.0).abs() < 1e-9);
        assert_eq!(result.metrics["confidence_interval_width"], 2.0);
        assert_eq!(result.metrics["data_quality_score"], 1.0);
    }

    #[tokio::test]
    async fn rejects_unsupported_enumerations_before_fetching() {
        let predictor = Arc::new(Counting::default());
        let (orchestrator, _clock) = orchestrator(predictor.clone(), &Settings::default());

        let horizon = orchestrator.predict(&btc(), 14, 0.95, true).await;
        let confidence = orchestrator.predict(&btc(), 7, 0.9, true).await;

        assert!(matches!(horizon, Err(AnalyticsError::InvalidParameter { name: "horizon", .. })));
        assert!(matches!(
            confidence,
            Err(AnalyticsError::InvalidParameter { name: "confidence_level", .. })
        ));
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }
}
