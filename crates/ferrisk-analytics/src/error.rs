use ferrisk_core::{ExchangeError, Symbol, ValidationError};
use thiserror::Error;

use crate::prediction::PredictorError;

/// Errors raised by the analytics engines.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid {name} '{value}': expected {expected}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("market data unavailable: {0}")]
    UpstreamUnavailable(#[source] ExchangeError),

    #[error("insufficient data for {symbol}: {reason}")]
    InsufficientData { symbol: Symbol, reason: String },

    #[error(transparent)]
    Predictor(#[from] PredictorError),
}

impl From<ExchangeError> for AnalyticsError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::Validation(inner) => Self::Validation(inner),
            ExchangeError::UnsupportedExchange { exchange } => {
                Self::Validation(ValidationError::UnsupportedExchange { value: exchange })
            }
            other => Self::UpstreamUnavailable(other),
        }
    }
}

impl AnalyticsError {
    pub(crate) fn insufficient(symbol: &Symbol, reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            symbol: symbol.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ferrisk_core::ExchangeId;

    use super::*;

    #[test]
    fn transport_failures_map_to_upstream_unavailable() {
        let err = AnalyticsError::from(ExchangeError::CircuitOpen {
            exchange: ExchangeId::Binance,
        });
        assert!(matches!(err, AnalyticsError::UpstreamUnavailable(_)));
    }

    #[test]
    fn request_validation_stays_validation() {
        let err = AnalyticsError::from(ExchangeError::Validation(ValidationError::ZeroLimit));
        assert!(matches!(
            err,
            AnalyticsError::Validation(ValidationError::ZeroLimit)
        ));
    }
}
