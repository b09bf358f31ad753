use std::str::FromStr;

use serde::Serialize;

use ferrisk_core::{aggregate, HistoricalSeries, Interval, SeriesRange, Symbol, UtcDateTime};

use crate::cli::CandlesArgs;
use crate::error::CliError;

use super::{parse_exchange, CommandResult, Context};

#[derive(Debug, Serialize)]
struct CandlesResponseData {
    series: HistoricalSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_interval: Option<Interval>,
}

pub async fn run(args: &CandlesArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let interval = Interval::from_str(&args.interval)?;
    let exchange = parse_exchange(&args.exchange)?;
    let range = match (&args.start, &args.end) {
        (Some(start), Some(end)) => SeriesRange::Between {
            start: UtcDateTime::parse(start)?,
            end: UtcDateTime::parse(end)?,
        },
        _ => SeriesRange::Limit(args.limit),
    };
    let target = args
        .aggregate
        .as_deref()
        .map(Interval::from_str)
        .transpose()?;

    let (source, data_source) = context.candle_source(exchange);
    let fetched = source.fetch_series(&symbol, interval, range).await?;

    let mut warnings = Vec::new();
    if fetched.is_empty() {
        warnings.push(format!("no {interval} candles returned for {symbol}"));
    }

    let data = match target {
        Some(target) => CandlesResponseData {
            series: aggregate(&fetched, target, None, !args.no_vwap)?,
            source_interval: Some(interval),
        },
        None => CandlesResponseData {
            series: fetched,
            source_interval: None,
        },
    };

    Ok(CommandResult::ok(serde_json::to_value(data)?, data_source).with_warnings(warnings))
}
