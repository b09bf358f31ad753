//! Streaming ingestion: fetch, validate, reconcile.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ValidationSettings;
use crate::exchange_client::{ExchangeClient, ExchangeError};
use crate::reconcile::CrossExchangeReconciler;
use crate::validator::MarketDataValidator;
use crate::{ExchangeId, Observation, Symbol};

/// Observation turned away by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedObservation {
    pub symbol: Symbol,
    pub price: f64,
    pub reason: String,
}

/// Outcome of one ingestion round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub exchange: ExchangeId,
    pub accepted: Vec<Observation>,
    pub rejected: Vec<RejectedObservation>,
}

#[derive(Debug, Default)]
struct SymbolHistory {
    last_accepted: Option<f64>,
    prices: VecDeque<f64>,
}

/// Ties the exchange client, validator and reconciler together and remembers, per symbol, the
/// last accepted price and a bounded price history.
pub struct MarketDataPipeline {
    client: Arc<ExchangeClient>,
    validator: MarketDataValidator,
    reconciler: CrossExchangeReconciler,
    history_capacity: usize,
    history: Mutex<HashMap<Symbol, SymbolHistory>>,
}

impl MarketDataPipeline {
    pub fn new(client: Arc<ExchangeClient>, settings: &ValidationSettings) -> Self {
        Self {
            reconciler: CrossExchangeReconciler::from_settings(Arc::clone(&client), settings),
            client,
            validator: MarketDataValidator::from_settings(settings),
            history_capacity: settings.history_capacity.max(1),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Seeds the price history of `symbol`, oldest first. The last value becomes the previous
    /// accepted price.
    pub fn seed_history(&self, symbol: &Symbol, prices: &[f64]) {
        let mut history = self.history.lock().expect("pipeline history lock is not poisoned");
        let entry = history.entry(symbol.clone()).or_default();
        for price in prices {
            push_bounded(&mut entry.prices, *price, self.history_capacity);
        }
        entry.last_accepted = prices.last().copied().or(entry.last_accepted);
    }

    pub fn last_accepted_price(&self, symbol: &Symbol) -> Option<f64> {
        self.history
            .lock()
            .expect("pipeline history lock is not poisoned")
            .get(symbol)
            .and_then(|entry| entry.last_accepted)
    }

    /// Fetches tickers from `exchange` and sorts each observation into accepted or rejected.
    pub async fn ingest(
        &self,
        symbols: &[Symbol],
        exchange: ExchangeId,
        reconcile: bool,
    ) -> Result<IngestReport, ExchangeError> {
        let observations = self.client.fetch_ticker(symbols, exchange).await?;
        let mut report = IngestReport {
            exchange,
            accepted: Vec::new(),
            rejected: Vec::new(),
        };

        for observation in observations {
            let (previous, window) = self.snapshot(observation.symbol());
            let rejection =
                self.validator
                    .rejection_reason(&observation, previous, Some(window.as_slice()));

            let rejection = match rejection {
                Some(reason) => Some(reason),
                None if reconcile && exchange != self.reconciler.alternate() => {
                    (!self.reconciler.reconcile(&observation).await).then(|| {
                        format!("deviates from {} reference price", self.reconciler.alternate())
                    })
                }
                None => None,
            };

            match rejection {
                Some(reason) => {
                    warn!(symbol = %observation.symbol(), price = observation.price(), %reason, "observation rejected");
                    report.rejected.push(RejectedObservation {
                        symbol: observation.symbol().clone(),
                        price: observation.price(),
                        reason,
                    });
                }
                None => {
                    self.remember(&observation);
                    report.accepted.push(observation);
                }
            }
        }

        info!(
            %exchange,
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "ingestion round complete"
        );
        Ok(report)
    }

    fn snapshot(&self, symbol: &Symbol) -> (Option<f64>, Vec<f64>) {
        let history = self.history.lock().expect("pipeline history lock is not poisoned");
        history
            .get(symbol)
            .map(|entry| (entry.last_accepted, entry.prices.iter().copied().collect()))
            .unwrap_or_default()
    }

    fn remember(&self, observation: &Observation) {
        let mut history = self.history.lock().expect("pipeline history lock is not poisoned");
        let entry = history.entry(observation.symbol().clone()).or_default();
        entry.last_accepted = Some(observation.price());
        push_bounded(&mut entry.prices, observation.price(), self.history_capacity);
    }
}

fn push_bounded(prices: &mut VecDeque<f64>, price: f64, capacity: usize) {
    prices.push_back(price);
    while prices.len() > capacity {
        prices.pop_front();
    }
}
