//! Behavior-driven tests for risk, trend and prediction analytics.

use std::sync::Arc;

use ferrisk_analytics::{
    AnalyticsError, Indicator, MonteCarloPredictor, PredictionOrchestrator, RiskAnalyticsEngine,
    TrendAnalyticsEngine, TrendDirection, DEFAULT_RISK_WINDOWS,
};
use ferrisk_core::{FeatureColumn, Settings, SyntheticCandleSource, UtcDateTime};
use ferrisk_tests::{daily_series, symbol, StaticCandleSource, LATEST_OPEN_MILLIS};

fn synthetic(seed: u64) -> Arc<SyntheticCandleSource> {
    let anchor = UtcDateTime::from_unix_millis(LATEST_OPEN_MILLIS).expect("valid anchor");
    Arc::new(SyntheticCandleSource::new(seed).with_anchor(anchor))
}

// =============================================================================
// Risk
// =============================================================================

#[tokio::test]
async fn when_price_never_moves_risk_is_driven_by_the_sharpe_term_alone() {
    // Given: 91 days at a constant price
    let btc = symbol("BTCUSDT");
    let engine = RiskAnalyticsEngine::new(StaticCandleSource::new(daily_series(&btc, &[100.0; 91])));

    // When: The default windows are analyzed
    let report = engine.compute(&btc, &DEFAULT_RISK_WINDOWS).await.expect("report");

    // Then: Every window is free of losses and the score is the Sharpe weight
    for days in DEFAULT_RISK_WINDOWS {
        let window = report.window(days).expect("window present");
        assert_eq!(window.value_at_risk.p95, 0.0);
        assert_eq!(window.volatility, 0.0);
        assert_eq!(window.sharpe_ratio, 0.0);
        assert_eq!(window.max_drawdown, 0.0);
        assert_eq!(window.observations, days);
    }
    assert!((report.risk_score - 20.0).abs() < 1e-9);
    assert_eq!(report.metadata.data_points, 91);
}

#[tokio::test]
async fn when_prices_move_expected_shortfall_is_at_least_as_severe_as_value_at_risk() {
    // Given: A seeded random walk
    let engine = RiskAnalyticsEngine::new(synthetic(3));

    // When: Risk is computed over the default windows
    let report = engine
        .compute(&symbol("ETHUSDT"), &DEFAULT_RISK_WINDOWS)
        .await
        .expect("report");

    // Then: Tails are ordered and the score is bounded
    for window in report.risk_metrics.values() {
        assert!(window.conditional_var.p95 <= window.value_at_risk.p95);
        assert!(window.conditional_var.p99 <= window.value_at_risk.p99);
        assert!(window.value_at_risk.p99 <= window.value_at_risk.p95);
        assert!(window.volatility > 0.0);
        assert!(window.max_drawdown <= 0.0);
    }
    assert!((0.0..=100.0).contains(&report.risk_score));
}

#[tokio::test]
async fn when_a_window_is_too_short_risk_request_is_rejected() {
    // Given: Any source
    let engine = RiskAnalyticsEngine::new(synthetic(3));

    // When: A one-day window is requested
    let result = engine.compute(&symbol("ETHUSDT"), &[1, 30]).await;

    // Then: The request fails as an invalid parameter
    assert!(matches!(result, Err(AnalyticsError::InvalidParameter { .. })));
}

// =============================================================================
// Trend
// =============================================================================

#[tokio::test]
async fn when_price_is_flat_trend_is_neutral_with_collapsed_bands() {
    // Given: Forty days at a constant price
    let sol = symbol("SOLUSDT");
    let engine = TrendAnalyticsEngine::new(StaticCandleSource::new(daily_series(&sol, &[50.0; 40])));

    // When: All indicators are computed over the full window
    let report = engine.analyze(&sol, 40, &[]).await.expect("report");

    // Then: There is no direction and the indicators sit at their neutral values
    assert_eq!(report.trend.direction, TrendDirection::Neutral);
    assert_eq!(report.trend.strength, 0.0);
    assert_eq!(report.technical_indicators.rsi.value(), Some(&50.0));
    let bands = report
        .technical_indicators
        .bollinger
        .value()
        .expect("twenty closes available");
    assert_eq!((bands.lower, bands.upper), (50.0, 50.0));
    assert_eq!(report.momentum.momentum_1d, Some(0.0));
    assert_eq!(report.metadata.data_points, 40);
}

#[tokio::test]
async fn when_price_rises_steadily_trend_is_bullish() {
    // Given: Forty days of a steady climb
    let closes: Vec<f64> = (0..40).map(|day| 100.0 + f64::from(day)).collect();
    let btc = symbol("BTCUSDT");
    let engine = TrendAnalyticsEngine::new(StaticCandleSource::new(daily_series(&btc, &closes)));

    // When: Only RSI is requested
    let report = engine.analyze(&btc, 40, &[Indicator::Rsi]).await.expect("report");

    // Then: Price sits above both averages and RSI agrees
    assert_eq!(report.trend.direction, TrendDirection::Bullish);
    assert!(report.trend.strength > 0.0);
    assert_eq!(report.technical_indicators.rsi.value(), Some(&100.0));
    assert!(!report.technical_indicators.macd.is_requested());
    assert_eq!(report.trend.confidence, 1.0);

    // And: Indicators that were not requested are left out of the output
    let value = serde_json::to_value(&report).expect("serializes");
    assert!(value["technical_indicators"].get("macd").is_none());
}

// =============================================================================
// Prediction
// =============================================================================

#[tokio::test]
async fn when_the_same_prediction_is_requested_twice_system_serves_the_cached_result() {
    // Given: An orchestrator over a seeded walk with an unseeded predictor
    let settings = Settings::default();
    let predictor = Arc::new(MonteCarloPredictor::from_settings(&settings.ml));
    let orchestrator = PredictionOrchestrator::new(synthetic(9), predictor, &settings);
    let btc = symbol("BTCUSDT");

    // When: The same key is requested twice with caching on
    let first = orchestrator.predict(&btc, 7, 0.95, true).await.expect("first");
    let second = orchestrator.predict(&btc, 7, 0.95, true).await.expect("second");

    // Then: Both calls return the identical result
    assert_eq!(first, second);
    let bounds = first.predictions.confidence_intervals;
    assert!(bounds.lower <= first.predictions.mean && first.predictions.mean <= bounds.upper);
    assert_eq!(first.metrics["data_quality_score"], 1.0);
}

#[tokio::test]
async fn when_history_is_flat_prediction_has_no_spread() {
    // Given: Ninety days at a constant price and a seeded close-only predictor
    let ada = symbol("ADAUSDT");
    let source = StaticCandleSource::new(daily_series(&ada, &[250.0; 90]));
    let mut settings = Settings::default();
    settings.ml.feature_columns = vec![FeatureColumn::Close];
    settings.ml.seed = Some(1);
    let predictor = Arc::new(MonteCarloPredictor::from_settings(&settings.ml));
    let orchestrator = PredictionOrchestrator::new(source, predictor, &settings);

    // When: A 30-day prediction at 99% is requested without the cache
    let result = orchestrator.predict(&ada, 30, 0.99, false).await.expect("result");

    // Then: Every simulated path stays at the last close
    let bounds = result.predictions.confidence_intervals;
    assert!((result.predictions.mean - 250.0).abs() < 1e-9);
    assert!((bounds.upper - bounds.lower).abs() < 1e-9);
    assert_eq!(result.metrics["historical_volatility"], 0.0);
}

#[tokio::test]
async fn when_horizon_is_unsupported_prediction_is_rejected() {
    // Given: A default orchestrator
    let settings = Settings::default();
    let predictor = Arc::new(MonteCarloPredictor::from_settings(&settings.ml));
    let orchestrator = PredictionOrchestrator::new(synthetic(9), predictor, &settings);

    // When: A 14-day horizon is requested
    let result = orchestrator.predict(&symbol("BTCUSDT"), 14, 0.95, true).await;

    // Then: The request fails before any prediction is made
    assert!(matches!(
        result,
        Err(AnalyticsError::InvalidParameter { name: "horizon", .. })
    ));
}
