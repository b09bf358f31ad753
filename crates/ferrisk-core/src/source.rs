use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Exchanges the market-data client knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Coingecko,
    Kraken,
    Huobi,
}

impl ExchangeId {
    pub const ALL: [Self; 4] = [Self::Binance, Self::Coingecko, Self::Kraken, Self::Huobi];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Coingecko => "coingecko",
            Self::Kraken => "kraken",
            Self::Huobi => "huobi",
        }
    }

    /// Environment variable overriding this exchange's REST base URL.
    pub fn endpoint_env_var(self) -> String {
        format!("FERRISK_{}_ENDPOINT", self.as_str().to_ascii_uppercase())
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "coingecko" => Ok(Self::Coingecko),
            "kraken" => Ok(Self::Kraken),
            "huobi" => Ok(Self::Huobi),
            other => Err(ValidationError::UnsupportedExchange {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(ExchangeId::from_str(" Binance ").expect("known"), ExchangeId::Binance);
        assert_eq!(ExchangeId::Huobi.endpoint_env_var(), "FERRISK_HUOBI_ENDPOINT");
    }

    #[test]
    fn rejects_unknown_exchange() {
        let err = ExchangeId::from_str("ftx").expect_err("must fail");
        assert!(matches!(err, ValidationError::UnsupportedExchange { .. }));
    }
}
