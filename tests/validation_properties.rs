//! Property-style checks of the observation validator thresholds.

use ferrisk_core::{
    MarketDataValidator, Observation, ObservationFields, UtcDateTime, ValidationError,
    ValidationSettings,
};
use ferrisk_tests::{symbol, LATEST_OPEN_MILLIS};

fn observation(price: f64) -> Observation {
    let timestamp = UtcDateTime::from_unix_millis(LATEST_OPEN_MILLIS).expect("valid timestamp");
    Observation::new(ObservationFields::new(symbol("BTCUSDT"), price, timestamp))
        .expect("valid observation")
}

// =============================================================================
// Static bounds
// =============================================================================

#[test]
fn prices_inside_the_static_bounds_pass_without_history() {
    let validator = MarketDataValidator::default();
    for price in [1e-8, 0.5, 43_250.12, 5e14] {
        assert!(validator.validate(&observation(price), None, None), "price {price}");
    }
}

#[test]
fn prices_at_or_beyond_the_upper_bound_are_rejected() {
    let validator = MarketDataValidator::default();
    for price in [2e15, 1e16, 1e20] {
        assert!(!validator.validate(&observation(price), None, None), "price {price}");
    }
}

#[test]
fn non_positive_prices_never_become_observations() {
    let timestamp = UtcDateTime::from_unix_millis(LATEST_OPEN_MILLIS).expect("valid timestamp");
    for price in [0.0, -1.0] {
        let result = Observation::new(ObservationFields::new(symbol("BTCUSDT"), price, timestamp));
        assert_eq!(
            result.expect_err("rejected"),
            ValidationError::NonPositiveValue { field: "price" }
        );
    }
}

// =============================================================================
// Change against the previous accepted price
// =============================================================================

#[test]
fn a_quarter_move_either_way_is_still_accepted() {
    let validator = MarketDataValidator::default();
    assert!(validator.validate(&observation(125.0), Some(100.0), None));
    assert!(validator.validate(&observation(75.0), Some(100.0), None));
}

#[test]
fn anything_past_a_quarter_move_is_rejected() {
    let validator = MarketDataValidator::default();
    assert!(!validator.validate(&observation(125.01), Some(100.0), None));
    assert!(!validator.validate(&observation(74.99), Some(100.0), None));
}

#[test]
fn change_limit_follows_settings() {
    let settings = ValidationSettings {
        max_price_change: 0.10,
        ..ValidationSettings::default()
    };
    let validator = MarketDataValidator::from_settings(&settings);
    assert!(validator.validate(&observation(110.0), Some(100.0), None));
    assert!(!validator.validate(&observation(111.0), Some(100.0), None));
}

// =============================================================================
// Z-score against the historical window
// =============================================================================

fn alternating_history(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| if i % 2 == 0 { 99.0 } else { 101.0 })
        .collect()
}

#[test]
fn z_score_rejects_outliers_once_history_is_long_enough() {
    let validator = MarketDataValidator::default();
    let history = alternating_history(24);

    // Mean 100, population std 1.
    assert!(validator.validate(&observation(102.5), None, Some(&history)));
    assert!(!validator.validate(&observation(103.5), None, Some(&history)));
    assert!(!validator.validate(&observation(96.5), None, Some(&history)));
}

#[test]
fn short_history_skips_the_z_score_check() {
    let validator = MarketDataValidator::default();
    let history = alternating_history(23);
    assert!(validator.validate(&observation(150.0), None, Some(&history)));
}

#[test]
fn flat_history_only_accepts_the_same_price() {
    let validator = MarketDataValidator::default();
    let history = vec![100.0; 24];
    assert!(validator.validate(&observation(100.0), None, Some(&history)));
    assert!(!validator.validate(&observation(100.5), None, Some(&history)));
}
