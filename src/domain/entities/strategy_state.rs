//! Per-symbol state owned by one strategy instance

use crate::domain::value_objects::rolling_window::RollingWindow;
use crate::domain::value_objects::sentiment::SentimentObservation;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub type SentimentHistory = RollingWindow<SentimentObservation>;
pub type PriceHistory = RollingWindow<f64>;

/// Sentiment and price histories plus last-trade timestamps, keyed by symbol.
///
/// Only the strategy that owns this value mutates it; nothing is shared between
/// instances.
#[derive(Debug, Clone)]
pub struct StrategyState {
    sentiment_window: usize,
    price_history_window: usize,
    sentiment: HashMap<String, SentimentHistory>,
    prices: HashMap<String, PriceHistory>,
    last_trade: HashMap<String, DateTime<Utc>>,
}

impl StrategyState {
    pub fn new(symbols: &[String], sentiment_window: usize, price_history_window: usize) -> Self {
        let mut state = Self {
            sentiment_window,
            price_history_window,
            sentiment: HashMap::new(),
            prices: HashMap::new(),
            last_trade: HashMap::new(),
        };
        for symbol in symbols {
            state.sentiment_mut(symbol);
            state.prices_mut(symbol);
        }
        state
    }

    fn sentiment_mut(&mut self, symbol: &str) -> &mut SentimentHistory {
        let window = self.sentiment_window;
        self.sentiment
            .entry(symbol.to_string())
            .or_insert_with(|| RollingWindow::new(window))
    }

    fn prices_mut(&mut self, symbol: &str) -> &mut PriceHistory {
        let window = self.price_history_window;
        self.prices
            .entry(symbol.to_string())
            .or_insert_with(|| RollingWindow::new(window))
    }

    pub fn record_sentiment(&mut self, symbol: &str, observation: SentimentObservation) {
        self.sentiment_mut(symbol).push(observation);
    }

    pub fn record_price(&mut self, symbol: &str, price: f64) {
        self.prices_mut(symbol).push(price);
    }

    pub fn sentiment_history(&self, symbol: &str) -> Option<&SentimentHistory> {
        self.sentiment.get(symbol)
    }

    /// Price samples oldest to newest; empty for unknown symbols
    pub fn price_samples(&self, symbol: &str) -> Vec<f64> {
        self.prices
            .get(symbol)
            .map(|history| history.to_vec())
            .unwrap_or_default()
    }

    pub fn mark_traded(&mut self, symbol: &str, at: DateTime<Utc>) {
        self.last_trade.insert(symbol.to_string(), at);
    }

    pub fn last_trade(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.last_trade.get(symbol).copied()
    }

    /// Drop all sentiment and price samples so a new session starts clean
    pub fn clear_histories(&mut self) {
        self.sentiment.values_mut().for_each(|h| h.clear());
        self.prices.values_mut().for_each(|h| h.clear());
    }
}
