//! Explicit runtime settings.
//!
//! Settings are assembled in three layers: [`Settings::default`], an optional JSON file
//! ([`Settings::from_json_file`]) and `FERRISK_*` environment overrides
//! ([`Settings::apply_env`]).

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit_breaker::{duration_secs, CircuitBreakerConfig};
use crate::retry::RetryConfig;
use crate::source::ExchangeId;

pub const ENV_RATE_LIMIT: &str = "FERRISK_API_RATE_LIMIT";
pub const ENV_TIMEOUT_SECONDS: &str = "FERRISK_API_TIMEOUT_SECONDS";
pub const ENV_FEATURE_COLUMNS: &str = "FERRISK_FEATURE_COLUMNS";
pub const ENV_CACHE_TTL_SECONDS: &str = "FERRISK_CACHE_TTL_SECONDS";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// Exchange connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Requests per minute per exchange.
    pub rate_limit_per_minute: u32,
    /// Total timeout of one HTTP request.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// REST base URLs. Exchanges without an entry are treated as unsupported.
    pub endpoints: BTreeMap<ExchangeId, String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 300,
            timeout: Duration::from_secs(30),
            endpoints: BTreeMap::from([
                (
                    ExchangeId::Binance,
                    "https://api.binance.com/api/v3".to_owned(),
                ),
                (
                    ExchangeId::Coingecko,
                    "https://api.coingecko.com/api/v3".to_owned(),
                ),
            ]),
        }
    }
}

impl ApiSettings {
    pub fn endpoint(&self, exchange: ExchangeId) -> Option<&str> {
        self.endpoints
            .get(&exchange)
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }
}

/// Symbol batching for `batch_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub size: usize,
    #[serde(with = "duration_secs")]
    pub delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: 100,
            delay: Duration::from_millis(100),
        }
    }
}

/// Thresholds of the ingestion validator and the cross-exchange check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub max_price: f64,
    /// Maximum relative move against the previous accepted price.
    pub max_price_change: f64,
    pub zscore_threshold: f64,
    /// History points required before the z-score check applies.
    pub min_history: usize,
    /// Rolling history kept per symbol by the pipeline.
    pub history_capacity: usize,
    pub reconcile_exchange: ExchangeId,
    pub max_exchange_deviation: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_price: 1e15,
            max_price_change: 0.25,
            zscore_threshold: 3.0,
            min_history: 24,
            history_capacity: 168,
            reconcile_exchange: ExchangeId::Coingecko,
            max_exchange_deviation: 0.05,
        }
    }
}

/// Candle-derived column fed into the predictor's feature window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    #[serde(alias = "price")]
    Close,
    Open,
    High,
    Low,
    Volume,
    /// `ln(close_t / close_{t-1})`, zero for the first row.
    LogReturn,
    /// `(high - low) / close`.
    HighLowRange,
}

impl FeatureColumn {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Volume => "volume",
            Self::LogReturn => "log_return",
            Self::HighLowRange => "high_low_range",
        }
    }
}

impl Display for FeatureColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureColumn {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "close" | "price" => Ok(Self::Close),
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "volume" => Ok(Self::Volume),
            "log_return" => Ok(Self::LogReturn),
            "high_low_range" => Ok(Self::HighLowRange),
            other => Err(ConfigError::InvalidValue {
                name: "feature column".to_owned(),
                value: other.to_owned(),
                reason: "expected one of close, open, high, low, volume, log_return, high_low_range"
                    .to_owned(),
            }),
        }
    }
}

/// Predictor inputs and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlSettings {
    pub feature_columns: Vec<FeatureColumn>,
    /// Daily candles fetched per prediction.
    pub lookback_days: usize,
    pub monte_carlo_iterations: usize,
    /// Seed for the Monte-Carlo predictor; unseeded when absent.
    pub seed: Option<u64>,
    /// Opaque hyperparameters forwarded to trained models.
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
}

impl Default for MlSettings {
    fn default() -> Self {
        Self {
            feature_columns: vec![
                FeatureColumn::Close,
                FeatureColumn::Volume,
                FeatureColumn::LogReturn,
                FeatureColumn::HighLowRange,
            ],
            lookback_days: 90,
            monte_carlo_iterations: 100,
            seed: None,
            hyperparameters: BTreeMap::from([
                ("learning_rate".to_owned(), serde_json::json!(0.001)),
                ("hidden_layers".to_owned(), serde_json::json!([128, 64, 32])),
                ("dropout_rate".to_owned(), serde_json::json!(0.2)),
            ]),
        }
    }
}

/// Prediction cache behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Whether a prediction computed with `use_cache = false` is still stored.
    pub write_on_bypass: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            write_on_bypass: true,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub batch: BatchSettings,
    pub validation: ValidationSettings,
    pub ml: MlSettings,
    pub cache: CacheSettings,
}

impl Settings {
    /// Reads settings from a JSON file; missing sections keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        settings.apply_env()?;
        Ok(settings)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies `FERRISK_*` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RATE_LIMIT) {
            let rate = parse_number::<u32>(ENV_RATE_LIMIT, &raw)?;
            if rate == 0 {
                return Err(invalid(ENV_RATE_LIMIT, &raw, "must be greater than zero"));
            }
            self.api.rate_limit_per_minute = rate;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECONDS) {
            let seconds = parse_number::<f64>(ENV_TIMEOUT_SECONDS, &raw)?;
            self.api.timeout = positive_duration(ENV_TIMEOUT_SECONDS, &raw, seconds)?;
        }

        for exchange in ExchangeId::ALL {
            let name = exchange.endpoint_env_var();
            if let Some(url) = lookup(&name) {
                let url = url.trim();
                if url.is_empty() {
                    self.api.endpoints.remove(&exchange);
                } else {
                    self.api.endpoints.insert(exchange, url.to_owned());
                }
            }
        }

        if let Some(raw) = lookup(ENV_FEATURE_COLUMNS) {
            let columns = raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(FeatureColumn::from_str)
                .collect::<Result<Vec<_>, _>>()?;
            if columns.is_empty() {
                return Err(invalid(ENV_FEATURE_COLUMNS, &raw, "at least one column is required"));
            }
            self.ml.feature_columns = columns;
        }

        if let Some(raw) = lookup(ENV_CACHE_TTL_SECONDS) {
            let seconds = parse_number::<f64>(ENV_CACHE_TTL_SECONDS, &raw)?;
            self.cache.ttl = positive_duration(ENV_CACHE_TTL_SECONDS, &raw, seconds)?;
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(name, raw, "not a number"))
}

fn positive_duration(name: &str, raw: &str, seconds: f64) -> Result<Duration, ConfigError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(invalid(name, raw, "must be a positive number of seconds"));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_owned(),
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_cover_binance_and_coingecko_only() {
        let settings = Settings::default();
        assert_eq!(settings.api.rate_limit_per_minute, 300);
        assert_eq!(
            settings.api.endpoint(ExchangeId::Binance),
            Some("https://api.binance.com/api/v3")
        );
        assert_eq!(settings.api.endpoint(ExchangeId::Kraken), None);
        assert_eq!(settings.cache.ttl, Duration::from_secs(300));
        assert!(settings.cache.write_on_bypass);
        assert_eq!(settings.batch.size, 100);
    }

    #[test]
    fn env_overrides_are_applied() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup(&[
                (ENV_RATE_LIMIT, "120"),
                (ENV_TIMEOUT_SECONDS, "5"),
                ("FERRISK_KRAKEN_ENDPOINT", "https://kraken.test/"),
                (ENV_FEATURE_COLUMNS, "price, volume"),
                (ENV_CACHE_TTL_SECONDS, "60"),
            ]))
            .expect("overrides are valid");

        assert_eq!(settings.api.rate_limit_per_minute, 120);
        assert_eq!(settings.api.timeout, Duration::from_secs(5));
        assert_eq!(
            settings.api.endpoint(ExchangeId::Kraken),
            Some("https://kraken.test")
        );
        assert_eq!(
            settings.ml.feature_columns,
            vec![FeatureColumn::Close, FeatureColumn::Volume]
        );
        assert_eq!(settings.cache.ttl, Duration::from_secs(60));
    }

    #[test]
    fn rejects_unknown_feature_column() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(lookup(&[(ENV_FEATURE_COLUMNS, "close,market_dominance")]))
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn rejects_zero_rate_limit() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(lookup(&[(ENV_RATE_LIMIT, "0")]))
            .expect_err("must fail");
        assert!(err.to_string().contains(ENV_RATE_LIMIT));
    }

    #[test]
    fn json_file_keeps_defaults_for_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"api": {{"rate_limit_per_minute": 60}}, "cache": {{"write_on_bypass": false}}}}"#
        )
        .expect("write settings");

        let settings = Settings::from_json_file(file.path()).expect("valid settings");
        assert_eq!(settings.api.rate_limit_per_minute, 60);
        assert!(settings.api.endpoint(ExchangeId::Coingecko).is_some());
        assert!(!settings.cache.write_on_bypass);
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn malformed_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{not json").expect("write settings");

        let err = Settings::from_json_file(file.path()).expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
