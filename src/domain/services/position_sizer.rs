//! Position sizing service that turns a sentiment probability into a notional
//!
//! The size respects:
//! - a base fraction of the portfolio
//! - a sentiment multiplier capped at 1.5×
//! - the risk manager's limits (which may only shrink the request)
//! - a hard cap of `max_position_size` of the portfolio

use crate::domain::entities::account::AccountState;
use crate::domain::errors::{DeferReason, Outcome};
use crate::domain::services::risk_manager::{Exposure, RiskManager};
use tracing::{debug, warn};

/// Cap on sentiment-driven amplification of the base size
pub const MAX_SENTIMENT_MULTIPLIER: f64 = 1.5;

/// Minimum number of price samples required before sizing
pub const MIN_PRICE_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingConfig {
    pub sentiment_threshold: f64,
    /// Base position as a fraction of portfolio value
    pub position_size: f64,
    /// Hard cap as a fraction of portfolio value
    pub max_position_size: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            sentiment_threshold: 0.6,
            position_size: 0.1,
            max_position_size: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// `min(p / threshold, 1.5)`, never negative
    pub fn sentiment_multiplier(&self, sentiment_probability: f64) -> f64 {
        if self.config.sentiment_threshold <= 0.0 || !sentiment_probability.is_finite() {
            return 0.0;
        }
        (sentiment_probability / self.config.sentiment_threshold)
            .min(MAX_SENTIMENT_MULTIPLIER)
            .max(0.0)
    }

    /// Notional to commit to `symbol`.
    ///
    /// Defers when fewer than two price samples are available.
    pub fn size(
        &self,
        symbol: &str,
        sentiment_probability: f64,
        account: &AccountState,
        price_history: &[f64],
        exposures: &[Exposure<'_>],
        risk_manager: &RiskManager,
    ) -> Outcome<f64> {
        if price_history.len() < MIN_PRICE_SAMPLES {
            warn!("Insufficient price history for {}", symbol);
            return Outcome::Deferred(DeferReason::InsufficientPriceHistory {
                symbol: symbol.to_string(),
                have: price_history.len(),
            });
        }

        let portfolio_value = account.portfolio_value;
        if !portfolio_value.is_finite() || portfolio_value <= 0.0 {
            return Outcome::Ready(0.0);
        }

        let base_size = portfolio_value * self.config.position_size;
        let desired_size = base_size * self.sentiment_multiplier(sentiment_probability);

        let adjusted_size = risk_manager.adjust_position_size(
            symbol,
            desired_size,
            price_history,
            exposures,
            portfolio_value,
        );
        let cap = portfolio_value * self.config.max_position_size;
        let final_size = adjusted_size.min(cap).max(0.0);

        debug!(
            "Sized {}: base ${:.2}, desired ${:.2}, risk-adjusted ${:.2}, final ${:.2}",
            symbol, base_size, desired_size, adjusted_size, final_size
        );
        Outcome::Ready(final_size)
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(SizingConfig::default())
    }
}
