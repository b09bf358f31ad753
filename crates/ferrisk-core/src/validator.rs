use tracing::debug;

use crate::config::ValidationSettings;
use crate::Observation;

/// Anomaly checks applied to each incoming observation.
///
/// A rejected observation is reported as `false`; the validator never errors.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataValidator {
    max_price: f64,
    max_price_change: f64,
    zscore_threshold: f64,
    min_history: usize,
}

impl Default for MarketDataValidator {
    fn default() -> Self {
        Self::from_settings(&ValidationSettings::default())
    }
}

impl MarketDataValidator {
    pub fn from_settings(settings: &ValidationSettings) -> Self {
        Self {
            max_price: settings.max_price,
            max_price_change: settings.max_price_change,
            zscore_threshold: settings.zscore_threshold,
            min_history: settings.min_history,
        }
    }

    pub fn validate(
        &self,
        observation: &Observation,
        previous_price: Option<f64>,
        historical_window: Option<&[f64]>,
    ) -> bool {
        self.rejection_reason(observation, previous_price, historical_window)
            .is_none()
    }

    /// Why `observation` would be rejected, or `None` when it passes every check.
    pub fn rejection_reason(
        &self,
        observation: &Observation,
        previous_price: Option<f64>,
        historical_window: Option<&[f64]>,
    ) -> Option<String> {
        let price = observation.price();
        let symbol = observation.symbol();

        if !(price > 0.0 && price < self.max_price) {
            debug!(%symbol, price, "price outside static bounds");
            return Some(format!("price {price} outside (0, {})", self.max_price));
        }

        if let Some(previous) = previous_price.filter(|previous| *previous > 0.0) {
            let change = (price - previous).abs() / previous;
            if change > self.max_price_change {
                debug!(%symbol, price, previous, change, "price change above threshold");
                return Some(format!(
                    "price change {change:.4} against previous {previous} exceeds {}",
                    self.max_price_change
                ));
            }
        }

        if let Some(window) = historical_window.filter(|window| window.len() >= self.min_history) {
            let mean = window.iter().sum::<f64>() / window.len() as f64;
            let variance =
                window.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / window.len() as f64;
            let std = variance.sqrt();

            if std == 0.0 {
                if price != mean {
                    debug!(%symbol, price, mean, "price deviates from a flat history");
                    return Some(format!("price {price} deviates from flat history at {mean}"));
                }
            } else {
                let zscore = (price - mean).abs() / std;
                if zscore > self.zscore_threshold {
                    debug!(%symbol, price, zscore, "z-score above threshold");
                    return Some(format!(
                        "z-score {zscore:.2} exceeds {}",
                        self.zscore_threshold
                    ));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObservationFields, Symbol, UtcDateTime};

    fn observation(price: f64) -> Observation {
        let fields = ObservationFields::new(
            Symbol::parse("BTC").expect("valid"),
            price,
            UtcDateTime::from_unix_millis(1_700_000_000_000).expect("valid"),
        );
        Observation::new(fields).expect("valid observation")
    }

    #[test]
    fn rejects_prices_above_upper_bound() {
        let validator = MarketDataValidator::default();
        assert!(!validator.validate(&observation(1.5e15), None, None));
        assert!(validator.validate(&observation(9.9e14), None, None));
    }

    #[test]
    fn delta_threshold_is_inclusive() {
        let validator = MarketDataValidator::default();
        assert!(validator.validate(&observation(125.0), Some(100.0), None));
        assert!(validator.validate(&observation(75.0), Some(100.0), None));
        assert!(!validator.validate(&observation(125.01), Some(100.0), None));
        assert!(!validator.validate(&observation(74.99), Some(100.0), None));
    }

    #[test]
    fn non_positive_previous_price_is_ignored() {
        let validator = MarketDataValidator::default();
        assert!(validator.validate(&observation(500.0), Some(0.0), None));
    }

    #[test]
    fn zscore_applies_only_with_enough_history() {
        let validator = MarketDataValidator::default();
        let window: Vec<f64> = (0..24).map(|i| 100.0 + f64::from(i % 2)).collect();

        assert!(!validator.validate(&observation(110.0), None, Some(&window)));
        assert!(validator.validate(&observation(110.0), None, Some(&window[..23])));
        assert!(validator.validate(&observation(100.5), None, Some(&window)));
    }

    #[test]
    fn flat_history_accepts_only_the_mean() {
        let validator = MarketDataValidator::default();
        let window = vec![100.0; 30];

        assert!(validator.validate(&observation(100.0), None, Some(&window)));
        let reason = validator
            .rejection_reason(&observation(100.5), None, Some(&window))
            .expect("rejected");
        assert!(reason.contains("flat history"));
    }
}
