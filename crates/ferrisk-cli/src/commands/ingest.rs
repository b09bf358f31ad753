use ferrisk_core::MarketDataPipeline;

use crate::cli::IngestArgs;
use crate::error::CliError;
use crate::metadata::DataSource;

use super::{parse_exchange, parse_symbols, CommandResult, Context};

pub async fn run(args: &IngestArgs, context: &Context) -> Result<CommandResult, CliError> {
    context.require_online("ingest")?;
    let symbols = parse_symbols(&args.symbols)?;
    let exchange = parse_exchange(&args.exchange)?;

    let pipeline = MarketDataPipeline::new(context.exchange_client(), &context.settings.validation);
    let report = pipeline
        .ingest(&symbols, exchange, !args.no_reconcile)
        .await?;

    let warnings: Vec<String> = report
        .rejected
        .iter()
        .map(|rejected| format!("{} rejected: {}", rejected.symbol, rejected.reason))
        .collect();
    let data = serde_json::to_value(&report)?;
    Ok(CommandResult::ok(data, DataSource::Exchange(exchange.to_string())).with_warnings(warnings))
}
