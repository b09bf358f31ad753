use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ValidationSettings;
use crate::exchange_client::ExchangeClient;
use crate::{ExchangeId, Observation};

/// Cross-checks an observation against the price reported by a second exchange.
pub struct CrossExchangeReconciler {
    client: Arc<ExchangeClient>,
    alternate: ExchangeId,
    max_deviation: f64,
}

impl CrossExchangeReconciler {
    pub fn new(client: Arc<ExchangeClient>, alternate: ExchangeId, max_deviation: f64) -> Self {
        Self {
            client,
            alternate,
            max_deviation,
        }
    }

    pub fn from_settings(client: Arc<ExchangeClient>, settings: &ValidationSettings) -> Self {
        Self::new(
            client,
            settings.reconcile_exchange,
            settings.max_exchange_deviation,
        )
    }

    pub fn alternate(&self) -> ExchangeId {
        self.alternate
    }

    /// `true` when the alternate exchange agrees within the deviation threshold. Failures to
    /// obtain a reference price accept the observation.
    pub async fn reconcile(&self, observation: &Observation) -> bool {
        let symbol = observation.symbol();
        let reference = match self
            .client
            .fetch_ticker(std::slice::from_ref(symbol), self.alternate)
            .await
        {
            Ok(observations) => observations,
            Err(err) => {
                warn!(%symbol, exchange = %self.alternate, error = %err, "cross-exchange check unavailable, accepting");
                return true;
            }
        };

        let prices: Vec<f64> = reference
            .iter()
            .filter(|other| other.symbol() == symbol)
            .map(Observation::price)
            .collect();
        if prices.is_empty() {
            warn!(%symbol, exchange = %self.alternate, "no reference price returned, accepting");
            return true;
        }

        let mean = prices.iter().sum::<f64>() / prices.len() as f64;
        let deviation = (observation.price() - mean).abs() / mean;
        debug!(%symbol, exchange = %self.alternate, deviation, "cross-exchange deviation");
        deviation <= self.max_deviation
    }
}
