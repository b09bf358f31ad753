//! Price prediction with uncertainty bands.
//!
//! [`PredictionOrchestrator`] fetches recent daily candles, lays them out as a `[1, T, F]`
//! feature window, hands the window to a [`Predictor`] and caches the result for a short TTL.
//! [`MonteCarloPredictor`] is the bundled predictor; trained models plug in through the same trait.

mod monte_carlo;
mod orchestrator;
mod predictor;

pub use monte_carlo::{MonteCarloPredictor, DEFAULT_ITERATIONS};
pub use orchestrator::{
    IntervalBounds, PredictionCache, PredictionKey, PredictionOrchestrator, PredictionResult,
    PricePrediction,
};
pub use predictor::{
    build_feature_window, ConfidenceLevel, Horizon, Predictor, PredictorError, PredictorOutput,
};
