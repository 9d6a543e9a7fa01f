use crate::domain::errors::OracleError;
use crate::domain::value_objects::sentiment::SentimentObservation;
use async_trait::async_trait;

/// Scores a batch of headlines.
///
/// Implementations must answer an empty batch with `SentimentObservation::neutral()`
/// rather than an error.
#[async_trait]
pub trait SentimentOracle: Send + Sync {
    async fn score(&self, headlines: &[String]) -> Result<SentimentObservation, OracleError>;
}
