use ferrisk_analytics::RiskAnalyticsEngine;
use ferrisk_core::Symbol;

use crate::cli::RiskArgs;
use crate::error::CliError;

use super::{parse_exchange, CommandResult, Context};

pub async fn run(args: &RiskArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let exchange = parse_exchange(&args.exchange)?;
    let (source, data_source) = context.candle_source(exchange);

    let report = RiskAnalyticsEngine::new(source)
        .compute(&symbol, &args.windows)
        .await?;

    let longest = args.windows.iter().copied().max().unwrap_or_default();
    let mut result = CommandResult::ok(serde_json::to_value(&report)?, data_source);
    if report.metadata.data_points <= longest {
        result = result.with_warning(format!(
            "only {} daily candles available; the {longest}d window is partial",
            report.metadata.data_points
        ));
    }
    Ok(result)
}
