//! Sentiment aggregation service
//!
//! Pulls recent headlines for a symbol, asks the oracle for a verdict, keeps the
//! verdict in the symbol's bounded history and reduces that history to one
//! recency-weighted consensus value.

use crate::domain::entities::strategy_state::StrategyState;
use crate::domain::errors::StrategyError;
use crate::domain::repositories::brokerage_gateway::BrokerageGateway;
use crate::domain::repositories::clock::Clock;
use crate::domain::repositories::sentiment_oracle::SentimentOracle;
use crate::domain::value_objects::sentiment::{SentimentLabel, SentimentObservation};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

/// Consensus over a symbol's sentiment history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedSentiment {
    pub probability: f64,
    pub label: SentimentLabel,
}

impl AggregatedSentiment {
    pub fn new(probability: f64, label: SentimentLabel) -> Self {
        Self { probability, label }
    }

    pub fn neutral() -> Self {
        Self::new(0.0, SentimentLabel::Neutral)
    }
}

/// Weight of the i-th of n observations, rising linearly from 0.5 (oldest) to 1.0 (newest)
fn recency_weight(index: usize, count: usize) -> f64 {
    if count <= 1 {
        return 0.5;
    }
    0.5 + 0.5 * index as f64 / (count - 1) as f64
}

/// Reduce observations (oldest first) to a weighted mean and a majority label.
///
/// The mean is `Σ(pᵢ·wᵢ) / n`. Label ties go to the first label in
/// `SentimentLabel::ALL` order. No observations yields `(0, neutral)`.
pub fn aggregate<'a, I>(observations: I) -> AggregatedSentiment
where
    I: IntoIterator<Item = &'a SentimentObservation>,
{
    let observations: Vec<&SentimentObservation> = observations.into_iter().collect();
    let count = observations.len();
    if count == 0 {
        return AggregatedSentiment::neutral();
    }

    let weighted_sum: f64 = observations
        .iter()
        .enumerate()
        .map(|(i, obs)| obs.probability * recency_weight(i, count))
        .sum();

    let mut dominant = SentimentLabel::Positive;
    let mut dominant_count = 0;
    for label in SentimentLabel::ALL {
        let label_count = observations.iter().filter(|o| o.label == label).count();
        if label_count > dominant_count {
            dominant = label;
            dominant_count = label_count;
        }
    }

    AggregatedSentiment::new(weighted_sum / count as f64, dominant)
}

pub struct SentimentAggregator {
    gateway: Arc<dyn BrokerageGateway>,
    oracle: Arc<dyn SentimentOracle>,
    clock: Arc<dyn Clock>,
    lookback: Duration,
}

impl SentimentAggregator {
    pub fn new(
        gateway: Arc<dyn BrokerageGateway>,
        oracle: Arc<dyn SentimentOracle>,
        clock: Arc<dyn Clock>,
        lookback_days: i64,
    ) -> Self {
        Self {
            gateway,
            oracle,
            clock,
            lookback: Duration::days(lookback_days.max(1)),
        }
    }

    /// Headlines published for `symbol` within the lookback window ending now
    pub async fn gather_headlines(&self, symbol: &str) -> Result<Vec<String>, StrategyError> {
        let end = self.clock.now();
        let start = end - self.lookback;

        let news = self
            .gateway
            .get_news(symbol, start, end)
            .await
            .map_err(|e| StrategyError::gateway(symbol, "get_news", e))?;

        Ok(news
            .into_iter()
            .map(|item| item.headline)
            .filter(|headline| !headline.trim().is_empty())
            .collect())
    }

    /// Score `headlines` and record the verdict in the symbol's history.
    ///
    /// An empty batch yields a neutral observation that is not recorded.
    pub async fn observe(
        &self,
        state: &mut StrategyState,
        symbol: &str,
        headlines: &[String],
    ) -> Result<SentimentObservation, StrategyError> {
        if headlines.is_empty() {
            info!("No news found for {}", symbol);
            return Ok(SentimentObservation::neutral());
        }

        info!("Analyzing {} headlines for {}", headlines.len(), symbol);
        let observation = self
            .oracle
            .score(headlines)
            .await
            .map_err(|source| StrategyError::Oracle {
                symbol: symbol.to_string(),
                source,
            })?;

        state.record_sentiment(symbol, observation);
        info!(
            "Sentiment for {} - Probability: {:.3}, Sentiment: {}",
            symbol, observation.probability, observation.label
        );
        Ok(observation)
    }

    /// Gather headlines and observe them in one step
    pub async fn refresh(
        &self,
        state: &mut StrategyState,
        symbol: &str,
    ) -> Result<SentimentObservation, StrategyError> {
        let headlines = self.gather_headlines(symbol).await?;
        self.observe(state, symbol, &headlines).await
    }

    pub fn aggregate(&self, state: &StrategyState, symbol: &str) -> AggregatedSentiment {
        let consensus = match state.sentiment_history(symbol) {
            Some(history) => aggregate(history.iter()),
            None => AggregatedSentiment::neutral(),
        };
        debug!(
            "Aggregated sentiment for {}: {:.3} {}",
            symbol, consensus.probability, consensus.label
        );
        consensus
    }
}
