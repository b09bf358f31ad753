use ferrisk_core::HistoricalSeriesStore;

use crate::cli::BatchArgs;
use crate::error::CliError;
use crate::metadata::DataSource;

use super::{parse_exchange, parse_symbols, CommandResult, Context};

pub async fn run(args: &BatchArgs, context: &Context) -> Result<CommandResult, CliError> {
    context.require_online("batch")?;
    let symbols = parse_symbols(&args.symbols)?;
    let exchange = parse_exchange(&args.exchange)?;

    let store =
        HistoricalSeriesStore::new(context.exchange_client(), context.settings.batch.clone())
            .with_exchange(exchange);
    let summary = store.batch_update(&symbols).await?;

    let warnings = summary.errors.clone();
    let data = serde_json::to_value(&summary)?;
    Ok(CommandResult::ok(data, DataSource::Exchange(exchange.to_string())).with_warnings(warnings))
}
