use serde::Serialize;

use ferrisk_core::{CircuitState, ExchangeId, ExchangeStats, Symbol};

use crate::cli::StatsArgs;
use crate::error::CliError;
use crate::metadata::DataSource;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct ExchangeReport {
    exchange: ExchangeId,
    endpoint: Option<String>,
    circuit_state: CircuitState,
    stats: ExchangeStats,
}

#[derive(Debug, Serialize)]
struct StatsResponseData {
    exchanges: Vec<ExchangeReport>,
}

pub async fn run(args: &StatsArgs, context: &Context) -> Result<CommandResult, CliError> {
    let probe = args.probe.as_deref().map(Symbol::parse).transpose()?;
    if probe.is_some() {
        context.require_online("stats --probe")?;
    }

    let client = context.exchange_client();
    let mut warnings = Vec::new();
    if let Some(symbol) = &probe {
        for exchange in ExchangeId::ALL.into_iter().filter(|ex| client.supports(*ex)) {
            if let Err(error) = client
                .fetch_ticker(std::slice::from_ref(symbol), exchange)
                .await
            {
                warnings.push(format!("{exchange} probe failed: {error}"));
            }
        }
    }

    let stats = client.stats();
    let exchanges = ExchangeId::ALL
        .into_iter()
        .map(|exchange| ExchangeReport {
            exchange,
            endpoint: context
                .settings
                .api
                .endpoint(exchange)
                .map(str::to_owned),
            circuit_state: client.circuit_state(exchange),
            stats: stats.get(&exchange).copied().unwrap_or_default(),
        })
        .collect();

    let data = serde_json::to_value(StatsResponseData { exchanges })?;
    Ok(CommandResult::ok(data, DataSource::Exchange("all".to_owned())).with_warnings(warnings))
}
