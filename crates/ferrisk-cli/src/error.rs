use ferrisk_analytics::AnalyticsError;
use ferrisk_core::{ConfigError, ExchangeError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Command(_) => 2,
            Self::Exchange(
                ExchangeError::Validation(_) | ExchangeError::UnsupportedExchange { .. },
            ) => 2,
            Self::Exchange(_) => 3,
            Self::Analytics(error) => match error {
                AnalyticsError::Validation(_) | AnalyticsError::InvalidParameter { .. } => 2,
                AnalyticsError::UpstreamUnavailable(_) => 3,
                AnalyticsError::InsufficientData { .. } => 4,
                AnalyticsError::Predictor(_) => 5,
            },
            Self::Serialization(_) => 6,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use ferrisk_core::ExchangeId;

    use super::*;

    #[test]
    fn upstream_failures_exit_with_three() {
        let error = CliError::from(ExchangeError::CircuitOpen {
            exchange: ExchangeId::Binance,
        });
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn bad_input_exits_with_two() {
        let error = CliError::from(AnalyticsError::InvalidParameter {
            name: "horizon",
            value: "14".to_owned(),
            expected: "one of 1, 7, 30, 90",
        });
        assert_eq!(error.exit_code(), 2);
        assert_eq!(CliError::from(ValidationError::ZeroLimit).exit_code(), 2);
    }
}
