use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use ferrisk_core::{Candle, FeatureColumn, HistoricalSeries};
use ndarray::Array3;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::error::AnalyticsError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("feature window has shape {shape:?}, expected [1, T, {features}]")]
    ShapeMismatch { shape: Vec<usize>, features: usize },

    #[error("feature '{0}' is required by the predictor")]
    MissingFeature(FeatureColumn),

    #[error("at least one feature column is required")]
    NoFeatures,

    #[error("feature window has {rows} row(s), at least {required} required")]
    InsufficientHistory { rows: usize, required: usize },

    #[error("predictor output is invalid: {0}")]
    InvalidOutput(String),
}

/// Prediction horizon in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Horizon(u32);

impl Horizon {
    pub const SUPPORTED: [u32; 4] = [1, 7, 30, 90];

    pub const fn days(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Horizon {
    type Error = AnalyticsError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        if Self::SUPPORTED.contains(&days) {
            Ok(Self(days))
        } else {
            Err(AnalyticsError::InvalidParameter {
                name: "horizon",
                value: days.to_string(),
                expected: "one of 1, 7, 30, 90",
            })
        }
    }
}

impl Display for Horizon {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.0)
    }
}

impl Serialize for Horizon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

/// Two-sided confidence level of a prediction interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfidenceLevel {
    P68,
    P95,
    P99,
}

impl ConfidenceLevel {
    pub const ALL: [Self; 3] = [Self::P68, Self::P95, Self::P99];

    pub const fn value(self) -> f64 {
        match self {
            Self::P68 => 0.68,
            Self::P95 => 0.95,
            Self::P99 => 0.99,
        }
    }

    /// Standard normal quantile at `(1 + level) / 2`.
    pub const fn z_score(self) -> f64 {
        match self {
            Self::P68 => 0.994_457_883_209_753,
            Self::P95 => 1.959_963_984_540_054,
            Self::P99 => 2.575_829_303_548_901,
        }
    }
}

impl TryFrom<f64> for ConfidenceLevel {
    type Error = AnalyticsError;

    fn try_from(level: f64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|candidate| (candidate.value() - level).abs() < 1e-9)
            .ok_or_else(|| AnalyticsError::InvalidParameter {
                name: "confidence_level",
                value: level.to_string(),
                expected: "one of 0.68, 0.95, 0.99",
            })
    }
}

impl Display for ConfidenceLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for ConfidenceLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

/// Per-step point predictions and interval half-widths, plus model metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictorOutput {
    pub mean: Vec<f64>,
    pub interval: Vec<f64>,
    pub metrics: BTreeMap<String, f64>,
}

impl PredictorOutput {
    /// Mean and half-width at the last predicted step.
    pub fn terminal(&self) -> Result<(f64, f64), PredictorError> {
        if self.mean.len() != self.interval.len() {
            return Err(PredictorError::InvalidOutput(format!(
                "{} mean value(s) but {} interval value(s)",
                self.mean.len(),
                self.interval.len()
            )));
        }
        match (self.mean.last(), self.interval.last()) {
            (Some(mean), Some(interval)) if mean.is_finite() && interval.is_finite() => {
                Ok((*mean, interval.abs()))
            }
            (Some(_), Some(_)) => Err(PredictorError::InvalidOutput(
                "non-finite prediction".to_owned(),
            )),
            _ => Err(PredictorError::InvalidOutput("empty prediction".to_owned())),
        }
    }
}

/// Boundary to a trained model.
///
/// `window` has shape `[1, T, F]`: one batch row, `T` time steps, `F` feature columns in the
/// configured order.
pub trait Predictor: Send + Sync {
    fn predict(
        &self,
        window: &Array3<f64>,
        horizon: Horizon,
        confidence: ConfidenceLevel,
    ) -> Result<PredictorOutput, PredictorError>;
}

/// Lays the series out as a `[1, T, F]` window over `columns`.
pub fn build_feature_window(
    series: &HistoricalSeries,
    columns: &[FeatureColumn],
) -> Result<Array3<f64>, PredictorError> {
    if columns.is_empty() {
        return Err(PredictorError::NoFeatures);
    }
    if series.is_empty() {
        return Err(PredictorError::InsufficientHistory {
            rows: 0,
            required: 1,
        });
    }

    let candles = series.candles();
    Ok(Array3::from_shape_fn(
        (1, candles.len(), columns.len()),
        |(_, row, col)| feature_value(candles, row, columns[col]),
    ))
}

fn feature_value(candles: &[Candle], row: usize, column: FeatureColumn) -> f64 {
    let candle = &candles[row];
    match column {
        FeatureColumn::Close => candle.close,
        FeatureColumn::Open => candle.open,
        FeatureColumn::High => candle.high,
        FeatureColumn::Low => candle.low,
        FeatureColumn::Volume => candle.volume,
        FeatureColumn::LogReturn => match row.checked_sub(1) {
            Some(previous) => (candle.close / candles[previous].close).ln(),
            None => 0.0,
        },
        FeatureColumn::HighLowRange => (candle.high - candle.low) / candle.close,
    }
}
