use ferrisk_analytics::{Indicator, TrendAnalyticsEngine};
use ferrisk_core::Symbol;

use crate::cli::TrendArgs;
use crate::error::CliError;

use super::{parse_exchange, CommandResult, Context};

pub async fn run(args: &TrendArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let exchange = parse_exchange(&args.exchange)?;
    let indicators = args
        .indicators
        .iter()
        .map(|raw| raw.parse::<Indicator>())
        .collect::<Result<Vec<_>, _>>()?;
    let (source, data_source) = context.candle_source(exchange);

    let report = TrendAnalyticsEngine::new(source)
        .analyze(&symbol, args.window, &indicators)
        .await?;

    let mut result = CommandResult::ok(serde_json::to_value(&report)?, data_source);
    if report.metadata.data_points < args.window {
        result = result.with_warning(format!(
            "requested {} candles but only {} were available",
            args.window, report.metadata.data_points
        ));
    }
    Ok(result)
}
