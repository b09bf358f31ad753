use std::collections::BTreeMap;
use std::sync::Arc;

use ferrisk_core::{CandleSource, HistoricalSeries, Interval, SeriesRange, Symbol, UtcDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AnalyticsError;
use crate::stats;

pub const DEFAULT_RISK_WINDOWS: [usize; 3] = [30, 60, 90];

/// Weights of the composite risk score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub value_at_risk: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub drawdown: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            value_at_risk: 0.3,
            volatility: 0.3,
            sharpe: 0.2,
            drawdown: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    /// Annual risk-free rate subtracted in the Sharpe ratio.
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    /// Window whose metrics drive the composite score.
    pub score_window: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            risk_free_rate: 0.02,
            periods_per_year: 252.0,
            score_window: 30,
        }
    }
}

/// A metric at the 95% and 99% levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TailLevels {
    #[serde(rename = "95")]
    pub p95: f64,
    #[serde(rename = "99")]
    pub p99: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowRisk {
    pub value_at_risk: TailLevels,
    pub conditional_var: TailLevels,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMetadata {
    pub analysis_windows: Vec<usize>,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub symbol: Symbol,
    pub timestamp: UtcDateTime,
    /// Keyed by window label such as `30d`.
    pub risk_metrics: BTreeMap<String, WindowRisk>,
    pub risk_score: f64,
    pub metadata: RiskMetadata,
}

impl RiskReport {
    pub fn window(&self, days: usize) -> Option<&WindowRisk> {
        self.risk_metrics.get(&window_label(days))
    }
}

/// Per-window tail risk and a weighted composite score over daily log returns.
pub struct RiskAnalyticsEngine {
    source: Arc<dyn CandleSource>,
    config: RiskConfig,
}

impl RiskAnalyticsEngine {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self::with_config(source, RiskConfig::default())
    }

    pub fn with_config(source: Arc<dyn CandleSource>, config: RiskConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub async fn compute(
        &self,
        symbol: &Symbol,
        windows: &[usize],
    ) -> Result<RiskReport, AnalyticsError> {
        validate_windows(windows)?;
        let longest = windows.iter().copied().max().unwrap_or_default();

        let series = self
            .source
            .fetch_series(symbol, Interval::ONE_DAY, SeriesRange::Limit(longest + 1))
            .await?;
        debug!(%symbol, candles = series.len(), "fetched series for risk analysis");

        let report = self.report(&series, windows)?;
        info!(%symbol, risk_score = report.risk_score, "risk report computed");
        Ok(report)
    }

    /// Builds a report from an already fetched daily series.
    pub fn report(
        &self,
        series: &HistoricalSeries,
        windows: &[usize],
    ) -> Result<RiskReport, AnalyticsError> {
        validate_windows(windows)?;
        if series.len() < 2 {
            return Err(AnalyticsError::insufficient(
                series.symbol(),
                format!("{} candle(s), at least 2 closes are required", series.len()),
            ));
        }

        let closes = series.closes();
        let risk_metrics: BTreeMap<String, WindowRisk> = windows
            .iter()
            .map(|&window| {
                let start = closes.len().saturating_sub(window + 1);
                let returns = stats::log_returns(&closes[start..]);
                (window_label(window), window_risk(&returns, &self.config))
            })
            .collect();

        let score_window = if windows.contains(&self.config.score_window) {
            self.config.score_window
        } else {
            windows.iter().copied().min().unwrap_or(self.config.score_window)
        };
        let risk_score = risk_metrics
            .get(&window_label(score_window))
            .map(|metrics| risk_score(metrics, &self.config.weights))
            .unwrap_or_default();

        Ok(RiskReport {
            symbol: series.symbol().clone(),
            timestamp: UtcDateTime::now(),
            risk_metrics,
            risk_score,
            metadata: RiskMetadata {
                analysis_windows: windows.to_vec(),
                data_points: series.len(),
            },
        })
    }
}

fn validate_windows(windows: &[usize]) -> Result<(), AnalyticsError> {
    if windows.is_empty() {
        return Err(AnalyticsError::InvalidParameter {
            name: "windows",
            value: "[]".to_owned(),
            expected: "at least one window",
        });
    }
    if let Some(window) = windows.iter().find(|window| **window < 2) {
        return Err(AnalyticsError::InvalidParameter {
            name: "window",
            value: window.to_string(),
            expected: "a window of at least 2 days",
        });
    }
    Ok(())
}

pub fn window_label(days: usize) -> String {
    format!("{days}d")
}

/// Risk metrics for one window of log returns. A zero-dispersion window has zero volatility and
/// a Sharpe ratio of zero.
pub fn window_risk(returns: &[f64], config: &RiskConfig) -> WindowRisk {
    let var95 = stats::percentile(returns, 5.0).unwrap_or_default();
    let var99 = stats::percentile(returns, 1.0).unwrap_or_default();
    let tail_mean = |threshold: f64| {
        let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= threshold).collect();
        stats::mean(&tail).unwrap_or(threshold)
    };

    let std = stats::sample_std(returns).unwrap_or_default();
    let annualization = config.periods_per_year.sqrt();
    let sharpe_ratio = if std > 0.0 {
        let excess: Vec<f64> = returns
            .iter()
            .map(|r| r - config.risk_free_rate / config.periods_per_year)
            .collect();
        annualization * stats::mean(&excess).unwrap_or_default() / std
    } else {
        0.0
    };

    WindowRisk {
        value_at_risk: TailLevels {
            p95: var95,
            p99: var99,
        },
        conditional_var: TailLevels {
            p95: tail_mean(var95),
            p99: tail_mean(var99),
        },
        volatility: std * annualization,
        sharpe_ratio,
        max_drawdown: stats::max_drawdown(returns),
        observations: returns.len(),
    }
}

/// Weighted score in `[0, 100]`; higher is riskier.
pub fn risk_score(metrics: &WindowRisk, weights: &RiskWeights) -> f64 {
    let raw = weights.value_at_risk * metrics.value_at_risk.p95.abs()
        + weights.volatility * metrics.volatility
        + weights.sharpe * (3.0 - metrics.sharpe_ratio).max(0.0) / 3.0
        + weights.drawdown * metrics.max_drawdown.abs();
    (raw * 100.0).clamp(0.0, 100.0)
}
