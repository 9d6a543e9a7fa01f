//! Signal generation from aggregated sentiment and the current position
//!
//! Each symbol is either Flat (no position) or Long. Positive sentiment above the
//! threshold moves Flat to Long; negative sentiment above the same threshold moves
//! Long to Flat. Everything else holds.

use crate::domain::entities::account::AccountState;
use crate::domain::entities::position::PositionSnapshot;
use crate::domain::entities::signal::Signal;
use crate::domain::errors::{DeferReason, Outcome, StrategyError};
use crate::domain::services::position_sizer::PositionSizer;
use crate::domain::services::risk_manager::{Exposure, RiskManager};
use crate::domain::services::sentiment_aggregator::AggregatedSentiment;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::quantity::Quantity;
use crate::domain::value_objects::sentiment::SentimentLabel;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalConfig {
    /// Single cutoff used for both entries and exits
    pub sentiment_threshold: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sentiment_threshold: 0.6,
            stop_loss: 0.02,
            take_profit: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Flat → Long
    Enter,
    /// Long → Flat
    Exit,
    Hold,
}

/// Everything the generator needs to decide for one symbol
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub symbol: &'a str,
    pub sentiment: AggregatedSentiment,
    pub price: Price,
    pub position: Option<&'a PositionSnapshot>,
    pub account: &'a AccountState,
    pub price_history: &'a [f64],
    pub exposures: &'a [Exposure<'a>],
    pub risk_manager: &'a RiskManager,
}

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: SignalConfig,
    sizer: PositionSizer,
}

impl SignalGenerator {
    pub fn new(config: SignalConfig, sizer: PositionSizer) -> Self {
        Self { config, sizer }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Decide the state transition without touching sizing
    pub fn transition(
        &self,
        sentiment: &AggregatedSentiment,
        position: Option<&PositionSnapshot>,
    ) -> Transition {
        let confident = sentiment.probability > self.config.sentiment_threshold;
        let holding = position.map_or(false, |p| p.is_open());

        match sentiment.label {
            SentimentLabel::Positive if confident && !holding => Transition::Enter,
            SentimentLabel::Negative if confident && holding => Transition::Exit,
            _ => Transition::Hold,
        }
    }

    /// Buy signal for a Flat symbol, sized in shares, with advisory brackets
    pub fn entry_signal(
        &self,
        symbol: &str,
        sentiment: &AggregatedSentiment,
        price: Price,
        account: &AccountState,
        price_history: &[f64],
        exposures: &[Exposure<'_>],
        risk_manager: &RiskManager,
    ) -> Outcome<Signal> {
        let notional = match self.sizer.size(
            symbol,
            sentiment.probability,
            account,
            price_history,
            exposures,
            risk_manager,
        ) {
            Outcome::Ready(notional) => notional,
            Outcome::Deferred(reason) => return Outcome::Deferred(reason),
            Outcome::Failed(error) => return Outcome::Failed(error),
        };

        if account.buying_power <= 0.0 {
            warn!(
                "Insufficient buying power (${:.2}) to open position in {}",
                account.buying_power, symbol
            );
            return Outcome::Deferred(DeferReason::NoBuyingPower {
                symbol: symbol.to_string(),
                buying_power: account.buying_power,
            });
        }
        let notional = notional.min(account.buying_power);

        let shares = match Quantity::from_notional(notional, price.value()) {
            Ok(shares) => shares,
            Err(e) => return Outcome::Failed(StrategyError::Validation(e)),
        };
        if shares.is_zero() {
            return Outcome::Ready(Signal::hold(price));
        }

        let brackets = price
            .offset_by(-self.config.stop_loss)
            .and_then(|sl| price.offset_by(self.config.take_profit).map(|tp| (sl, tp)));
        let (stop_loss, take_profit) = match brackets {
            Ok(brackets) => brackets,
            Err(e) => return Outcome::Failed(StrategyError::Validation(e)),
        };

        info!(
            "Buy signal for {}: {:.4} shares at ${:.2} (sentiment {:.3})",
            symbol,
            shares.value(),
            price.value(),
            sentiment.probability
        );
        Outcome::Ready(Signal::buy(shares.value(), price, stop_loss, take_profit))
    }

    /// Sell signal liquidating the whole position
    pub fn exit_signal(&self, price: Price, position: &PositionSnapshot) -> Signal {
        info!(
            "Sell signal for {}: {} shares at ${:.2}",
            position.symbol,
            position.quantity,
            price.value()
        );
        Signal::sell(position.quantity, price)
    }

    /// Full decision for one symbol
    pub fn generate(&self, ctx: &SignalContext<'_>) -> Outcome<Signal> {
        match self.transition(&ctx.sentiment, ctx.position) {
            Transition::Enter => self.entry_signal(
                ctx.symbol,
                &ctx.sentiment,
                ctx.price,
                ctx.account,
                ctx.price_history,
                ctx.exposures,
                ctx.risk_manager,
            ),
            Transition::Exit => match ctx.position {
                Some(position) => Outcome::Ready(self.exit_signal(ctx.price, position)),
                None => Outcome::Ready(Signal::hold(ctx.price)),
            },
            Transition::Hold => Outcome::Ready(Signal::hold(ctx.price)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::SignalKind;
    use crate::domain::services::position_sizer::SizingConfig;
    use crate::domain::services::risk_manager::RiskConfig;

    fn generator() -> SignalGenerator {
        SignalGenerator::new(SignalConfig::default(), PositionSizer::new(SizingConfig::default()))
    }

    fn risk() -> RiskManager {
        let manager = RiskManager::new(RiskConfig::default());
        manager.initialize().unwrap();
        manager
    }

    #[test]
    fn test_transition_table() {
        let generator = generator();
        let held = PositionSnapshot::new("XYZ", 10.0, 500.0);

        let cases = [
            (0.75, SentimentLabel::Positive, None, Transition::Enter),
            (0.75, SentimentLabel::Positive, Some(&held), Transition::Hold),
            (0.6, SentimentLabel::Positive, None, Transition::Hold),
            (0.9, SentimentLabel::Negative, Some(&held), Transition::Exit),
            (0.9, SentimentLabel::Negative, None, Transition::Hold),
            (0.6, SentimentLabel::Negative, Some(&held), Transition::Hold),
            (0.99, SentimentLabel::Neutral, None, Transition::Hold),
            (0.99, SentimentLabel::Neutral, Some(&held), Transition::Hold),
        ];
        for (probability, label, position, expected) in cases {
            let sentiment = AggregatedSentiment::new(probability, label);
            assert_eq!(
                generator.transition(&sentiment, position),
                expected,
                "p={} label={} held={}",
                probability,
                label,
                position.is_some()
            );
        }
    }

    #[test]
    fn test_never_buys_when_held_never_sells_when_flat() {
        let generator = generator();
        let risk = risk();
        let account = AccountState::new(100_000.0, 100_000.0, 100_000.0);
        let price = Price::new(50.0).unwrap();
        let held = PositionSnapshot::new("XYZ", 10.0, 500.0);
        let history = [50.0, 50.0];

        for label in SentimentLabel::ALL {
            for step in 0..=20 {
                let sentiment = AggregatedSentiment::new(step as f64 / 20.0, label);
                for position in [None, Some(&held)] {
                    let ctx = SignalContext {
                        symbol: "XYZ",
                        sentiment,
                        price,
                        position,
                        account: &account,
                        price_history: &history,
                        exposures: &[],
                        risk_manager: &risk,
                    };
                    if let Outcome::Ready(signal) = generator.generate(&ctx) {
                        if position.is_some() {
                            assert_ne!(signal.kind, SignalKind::Buy);
                        } else {
                            assert_ne!(signal.kind, SignalKind::Sell);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_entry_signal_reference_scenario() {
        let generator = generator();
        let account = AccountState::new(100_000.0, 100_000.0, 100_000.0);
        let sentiment = AggregatedSentiment::new(0.75, SentimentLabel::Positive);

        let signal = generator
            .entry_signal(
                "XYZ",
                &sentiment,
                Price::new(50.0).unwrap(),
                &account,
                &[50.0, 50.0],
                &[],
                &risk(),
            )
            .ready()
            .unwrap();

        assert_eq!(signal.kind, SignalKind::Buy);
        assert!((signal.size - 250.0).abs() < 1e-9);
        assert!((signal.stop_loss.unwrap().value() - 49.0).abs() < 1e-9);
        assert!((signal.take_profit.unwrap().value() - 52.5).abs() < 1e-9);
    }

    #[test]
    fn test_entry_signal_defers_on_short_history() {
        let generator = generator();
        let account = AccountState::new(100_000.0, 100_000.0, 100_000.0);
        let sentiment = AggregatedSentiment::new(0.9, SentimentLabel::Positive);

        let outcome = generator.entry_signal(
            "XYZ",
            &sentiment,
            Price::new(50.0).unwrap(),
            &account,
            &[50.0],
            &[],
            &risk(),
        );
        assert!(matches!(
            outcome,
            Outcome::Deferred(DeferReason::InsufficientPriceHistory { have: 1, .. })
        ));
    }

    #[test]
    fn test_entry_signal_clipped_to_buying_power() {
        let generator = generator();
        let account = AccountState::new(1_000.0, 1_000.0, 100_000.0);
        let sentiment = AggregatedSentiment::new(0.75, SentimentLabel::Positive);

        let signal = generator
            .entry_signal(
                "XYZ",
                &sentiment,
                Price::new(50.0).unwrap(),
                &account,
                &[50.0, 50.0],
                &[],
                &risk(),
            )
            .ready()
            .unwrap();
        assert!((signal.size - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_entry_signal_without_buying_power_defers() {
        let generator = generator();
        let account = AccountState::new(0.0, 0.0, 100_000.0);
        let sentiment = AggregatedSentiment::new(0.75, SentimentLabel::Positive);

        let outcome = generator.entry_signal(
            "XYZ",
            &sentiment,
            Price::new(50.0).unwrap(),
            &account,
            &[50.0, 50.0],
            &[],
            &risk(),
        );
        assert!(matches!(outcome, Outcome::Deferred(DeferReason::NoBuyingPower { .. })));
    }

    #[test]
    fn test_exit_signal_sells_full_quantity_without_price_history() {
        let generator = generator();
        let risk = risk();
        let account = AccountState::new(0.0, 0.0, 0.0);
        let held = PositionSnapshot::new("XYZ", 100.0, 5_000.0);
        let ctx = SignalContext {
            symbol: "XYZ",
            sentiment: AggregatedSentiment::new(0.9, SentimentLabel::Negative),
            price: Price::new(50.0).unwrap(),
            position: Some(&held),
            account: &account,
            price_history: &[],
            exposures: &[],
            risk_manager: &risk,
        };

        let signal = generator.generate(&ctx).ready().unwrap();
        assert_eq!(signal.kind, SignalKind::Sell);
        assert_eq!(signal.size, 100.0);
        assert!(signal.stop_loss.is_none());
    }
}
