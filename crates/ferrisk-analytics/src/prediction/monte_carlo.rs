use std::collections::BTreeMap;

use ferrisk_core::{FeatureColumn, MlSettings};
use ndarray::{s, Array3};

use super::predictor::{ConfidenceLevel, Horizon, Predictor, PredictorError, PredictorOutput};
use crate::stats;

pub const DEFAULT_ITERATIONS: usize = 100;

/// Bootstraps historical log returns into simulated price paths.
///
/// Each of `iterations` paths starts at the last close and draws `horizon` daily log returns with
/// replacement from the window. The per-step mean across paths is the prediction; the population
/// standard deviation scaled by the confidence level's z-score is the interval half-width.
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloPredictor {
    columns: Vec<FeatureColumn>,
    iterations: usize,
    seed: Option<u64>,
}

impl MonteCarloPredictor {
    pub fn new(columns: Vec<FeatureColumn>) -> Self {
        Self {
            columns,
            iterations: DEFAULT_ITERATIONS,
            seed: None,
        }
    }

    pub fn from_settings(settings: &MlSettings) -> Self {
        let mut predictor = Self::new(settings.feature_columns.clone())
            .with_iterations(settings.monte_carlo_iterations);
        predictor.seed = settings.seed;
        predictor
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn close_index(&self) -> Result<usize, PredictorError> {
        self.columns
            .iter()
            .position(|column| *column == FeatureColumn::Close)
            .ok_or(PredictorError::MissingFeature(FeatureColumn::Close))
    }
}

impl Predictor for MonteCarloPredictor {
    fn predict(
        &self,
        window: &Array3<f64>,
        horizon: Horizon,
        confidence: ConfidenceLevel,
    ) -> Result<PredictorOutput, PredictorError> {
        let shape = window.shape();
        if shape[0] != 1 || shape[2] != self.columns.len() {
            return Err(PredictorError::ShapeMismatch {
                shape: shape.to_vec(),
                features: self.columns.len(),
            });
        }
        let close = self.close_index()?;
        let closes = window.slice(s![0, .., close]).to_vec();
        if closes.len() < 2 {
            return Err(PredictorError::InsufficientHistory {
                rows: closes.len(),
                required: 2,
            });
        }
        let returns = stats::log_returns(&closes);
        let last_close = closes[closes.len() - 1];

        let mut rng = self
            .seed
            .map(fastrand::Rng::with_seed)
            .unwrap_or_else(fastrand::Rng::new);
        let steps = horizon.days() as usize;
        let mut paths = vec![Vec::with_capacity(self.iterations); steps];
        for _ in 0..self.iterations {
            let mut price = last_close;
            for step in paths.iter_mut() {
                price *= returns[rng.usize(..returns.len())].exp();
                step.push(price);
            }
        }

        let z = confidence.z_score();
        let (mean, interval): (Vec<f64>, Vec<f64>) = paths
            .iter()
            .map(|prices| {
                let mean = stats::mean(prices).unwrap_or(last_close);
                let std = stats::population_std(prices).unwrap_or_default();
                (mean, z * std)
            })
            .unzip();

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "mean_uncertainty".to_owned(),
            stats::mean(&interval).unwrap_or_default(),
        );
        metrics.insert(
            "max_uncertainty".to_owned(),
            interval.iter().copied().fold(0.0, f64::max),
        );
        metrics.insert("confidence_level".to_owned(), confidence.value());
        metrics.insert("iterations".to_owned(), self.iterations as f64);

        Ok(PredictorOutput {
            mean,
            interval,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(closes: &[f64]) -> Array3<f64> {
        Array3::from_shape_fn((1, closes.len(), 2), |(_, row, col)| {
            if col == 0 {
                closes[row]
            } else {
                1.0
            }
        })
    }

    fn predictor() -> MonteCarloPredictor {
        MonteCarloPredictor::new(vec![FeatureColumn::Close, FeatureColumn::Volume]).with_seed(11)
    }

    #[test]
    fn seeded_runs_are_reproducible_and_sized_by_horizon() {
        let closes: Vec<f64> = (0..90).map(|i| 100.0 + (f64::from(i) * 0.3).sin()).collect();
        let horizon = Horizon::try_from(7_u32).expect("valid");

        let first = predictor()
            .predict(&window(&closes), horizon, ConfidenceLevel::P95)
            .expect("output");
        let second = predictor()
            .predict(&window(&closes), horizon, ConfidenceLevel::P95)
            .expect("output");

        assert_eq!(first, second);
        assert_eq!(first.mean.len(), 7);
        assert_eq!(first.interval.len(), 7);
        assert_eq!(first.metrics["iterations"], 100.0);
        assert!(first.interval.iter().all(|width| *width >= 0.0));
    }

    #[test]
    fn wider_confidence_widens_interval() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + f64::from(i % 4)).collect();
        let horizon = Horizon::try_from(30_u32).expect("valid");

        let narrow = predictor()
            .predict(&window(&closes), horizon, ConfidenceLevel::P68)
            .expect("output");
        let wide = predictor()
            .predict(&window(&closes), horizon, ConfidenceLevel::P99)
            .expect("output");

        let (_, narrow_width) = narrow.terminal().expect("terminal");
        let (_, wide_width) = wide.terminal().expect("terminal");
        assert!(wide_width > narrow_width);
    }

    #[test]
    fn flat_history_predicts_flat_price() {
        let output = predictor()
            .predict(
                &window(&[100.0; 10]),
                Horizon::try_from(1_u32).expect("valid"),
                ConfidenceLevel::P95,
            )
            .expect("output");
        assert_eq!(output.terminal().expect("terminal"), (100.0, 0.0));
    }

    #[test]
    fn requires_close_column() {
        let predictor = MonteCarloPredictor::new(vec![FeatureColumn::Volume, FeatureColumn::Open]);
        let err = predictor
            .predict(
                &window(&[1.0, 2.0]),
                Horizon::try_from(1_u32).expect("valid"),
                ConfidenceLevel::P68,
            )
            .expect_err("close missing");
        assert_eq!(err, PredictorError::MissingFeature(FeatureColumn::Close));
    }

    #[test]
    fn rejects_mismatched_feature_count() {
        let predictor = MonteCarloPredictor::new(vec![FeatureColumn::Close]);
        let err = predictor
            .predict(
                &window(&[1.0, 2.0]),
                Horizon::try_from(1_u32).expect("valid"),
                ConfidenceLevel::P68,
            )
            .expect_err("shape");
        assert!(matches!(err, PredictorError::ShapeMismatch { .. }));
    }
}
