mod batch;
mod candles;
mod ingest;
mod predict;
mod risk;
mod stats;
mod ticker;
mod trend;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use ferrisk_core::{
    CandleSource, ExchangeClient, ExchangeId, HistoricalSeriesStore, ReqwestHttpClient, Settings,
    Symbol, SyntheticCandleSource,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::{DataSource, Envelope, Metadata};

/// Pooled connections kept per exchange host.
const MAX_IDLE_CONNECTIONS: usize = 16;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub source: DataSource,
}

impl CommandResult {
    pub fn ok(data: Value, source: DataSource) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            source,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Settings and flags shared by every command.
pub struct Context {
    pub settings: Settings,
    pub offline: bool,
    pub seed: u64,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self, CliError> {
        let mut settings = match &cli.config {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env()?;
        if cli.offline && settings.ml.seed.is_none() {
            settings.ml.seed = Some(cli.seed);
        }

        Ok(Self {
            settings,
            offline: cli.offline,
            seed: cli.seed,
        })
    }

    pub fn exchange_client(&self) -> Arc<ExchangeClient> {
        let http = Arc::new(ReqwestHttpClient::new(
            self.settings.api.timeout,
            MAX_IDLE_CONNECTIONS,
        ));
        Arc::new(ExchangeClient::new(&self.settings, http))
    }

    /// Candle source for analytics: the exchange, or the synthetic walk when offline.
    pub fn candle_source(&self, exchange: ExchangeId) -> (Arc<dyn CandleSource>, DataSource) {
        if self.offline {
            return (
                Arc::new(SyntheticCandleSource::new(self.seed)),
                DataSource::Synthetic { seed: self.seed },
            );
        }
        let store = HistoricalSeriesStore::new(self.exchange_client(), self.settings.batch.clone())
            .with_exchange(exchange);
        (
            Arc::new(store),
            DataSource::Exchange(exchange.to_string()),
        )
    }

    pub fn require_online(&self, command: &str) -> Result<(), CliError> {
        if self.offline {
            return Err(CliError::Command(format!(
                "'{command}' reads live exchange data and cannot run with --offline"
            )));
        }
        Ok(())
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let context = Context::load(cli)?;
    let started = Instant::now();

    let result = match &cli.command {
        Command::Ticker(args) => ticker::run(args, &context).await?,
        Command::Candles(args) => candles::run(args, &context).await?,
        Command::Batch(args) => batch::run(args, &context).await?,
        Command::Ingest(args) => ingest::run(args, &context).await?,
        Command::Risk(args) => risk::run(args, &context).await?,
        Command::Trend(args) => trend::run(args, &context).await?,
        Command::Predict(args) => predict::run(args, &context).await?,
        Command::Stats(args) => stats::run(args, &context).await?,
    };

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(latency_ms, "command finished");

    let CommandResult {
        data,
        warnings,
        source,
    } = result;
    let mut meta = Metadata::new(source, latency_ms);
    for warning in warnings {
        meta.push_warning(warning);
    }
    Ok(Envelope { meta, data })
}

pub fn parse_symbols(raw: &[String]) -> Result<Vec<Symbol>, CliError> {
    raw.iter()
        .map(|value| Symbol::parse(value).map_err(CliError::from))
        .collect()
}

pub fn parse_exchange(raw: &str) -> Result<ExchangeId, CliError> {
    Ok(ExchangeId::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_validated() {
        let symbols = parse_symbols(&["btcusdt".to_owned()]).expect("valid");
        assert_eq!(symbols[0].as_str(), "BTCUSDT");
        assert!(parse_symbols(&["B".to_owned()]).is_err());
    }

    #[test]
    fn unknown_exchange_is_rejected() {
        assert_eq!(parse_exchange("Kraken").expect("known"), ExchangeId::Kraken);
        assert_eq!(parse_exchange("ftx").expect_err("unknown").exit_code(), 2);
    }
}
