use std::sync::Arc;

use ferrisk_analytics::{MonteCarloPredictor, PredictionOrchestrator};
use ferrisk_core::Symbol;

use crate::cli::PredictArgs;
use crate::error::CliError;

use super::{parse_exchange, CommandResult, Context};

pub async fn run(args: &PredictArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let exchange = parse_exchange(&args.exchange)?;
    let (source, data_source) = context.candle_source(exchange);

    let predictor = MonteCarloPredictor::from_settings(&context.settings.ml);
    let orchestrator =
        PredictionOrchestrator::new(source, Arc::new(predictor), &context.settings);
    let prediction = orchestrator
        .predict(&symbol, args.horizon, args.confidence, !args.no_cache)
        .await?;

    Ok(CommandResult::ok(
        serde_json::to_value(&prediction)?,
        data_source,
    ))
}
