//! # Ferrisk Analytics
//!
//! Risk, trend and prediction engines over candle series supplied by any
//! [`ferrisk_core::CandleSource`].
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`risk`] | VaR, CVaR, volatility, Sharpe, drawdown and a weighted risk score |
//! | [`trend`] | RSI, MACD, Bollinger bands, momentum and trend direction |
//! | [`prediction`] | Predictor boundary, Monte-Carlo predictor and cached orchestration |
//! | [`stats`] | Shared numeric helpers |
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ferrisk_analytics::{RiskAnalyticsEngine, DEFAULT_RISK_WINDOWS};
//! use ferrisk_core::{Symbol, SyntheticCandleSource};
//!
//! let engine = RiskAnalyticsEngine::new(Arc::new(SyntheticCandleSource::default()));
//! let report = engine.compute(&Symbol::parse("BTC")?, &DEFAULT_RISK_WINDOWS).await?;
//! println!("{}", report.risk_score);
//! ```

pub mod error;
pub mod prediction;
pub mod risk;
pub mod stats;
pub mod trend;

pub use error::AnalyticsError;
pub use prediction::{
    build_feature_window, ConfidenceLevel, Horizon, MonteCarloPredictor, PredictionCache,
    PredictionKey, PredictionOrchestrator, PredictionResult, Predictor, PredictorError,
    PredictorOutput,
};
pub use risk::{
    risk_score, window_risk, RiskAnalyticsEngine, RiskConfig, RiskReport, RiskWeights,
    TailLevels, WindowRisk, DEFAULT_RISK_WINDOWS,
};
pub use trend::{
    analyze_series, BollingerBands, Indicator, MacdValues, Momentum, TechnicalIndicators,
    TrendAnalyticsEngine, TrendDirection, TrendReport, TrendSignal, DEFAULT_TREND_WINDOW,
};
