use serde::Serialize;

use ferrisk_core::Observation;

use crate::cli::TickerArgs;
use crate::error::CliError;
use crate::metadata::DataSource;

use super::{parse_exchange, parse_symbols, CommandResult, Context};

#[derive(Debug, Serialize)]
struct TickerResponseData {
    observations: Vec<Observation>,
}

pub async fn run(args: &TickerArgs, context: &Context) -> Result<CommandResult, CliError> {
    context.require_online("ticker")?;
    let symbols = parse_symbols(&args.symbols)?;
    let exchange = parse_exchange(&args.exchange)?;

    let observations = context
        .exchange_client()
        .fetch_ticker(&symbols, exchange)
        .await?;

    let missing = symbols.len().saturating_sub(observations.len());
    let data = serde_json::to_value(TickerResponseData { observations })?;
    let mut result = CommandResult::ok(data, DataSource::Exchange(exchange.to_string()));
    if missing > 0 {
        result = result.with_warning(format!(
            "{missing} symbol(s) returned no valid observation"
        ));
    }
    Ok(result)
}
