use crate::config::OracleConfig;
use crate::domain::errors::OracleError;
use crate::domain::repositories::sentiment_oracle::SentimentOracle;
use crate::domain::value_objects::sentiment::{SentimentLabel, SentimentObservation};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    headlines: &'a [String],
}

/// Scoring service reply
#[derive(Debug, Deserialize)]
pub struct ScoreResponse {
    pub probability: f64,
    pub sentiment: String,
}

impl TryFrom<ScoreResponse> for SentimentObservation {
    type Error = OracleError;

    fn try_from(response: ScoreResponse) -> Result<Self, Self::Error> {
        let label: SentimentLabel = response.sentiment.parse()?;
        SentimentObservation::new(response.probability, label)
    }
}

/// Sentiment oracle backed by an HTTP headline-scoring service
pub struct HttpSentimentOracle {
    client: Client,
    url: String,
}

impl HttpSentimentOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Unreachable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl SentimentOracle for HttpSentimentOracle {
    async fn score(&self, headlines: &[String]) -> Result<SentimentObservation, OracleError> {
        if headlines.is_empty() {
            return Ok(SentimentObservation::neutral());
        }

        debug!("Scoring {} headlines at {}", headlines.len(), self.url);
        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest { headlines })
            .send()
            .await
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OracleError::InvalidResponse(format!(
                "{} - {}",
                status, error_text
            )));
        }

        let reply: ScoreResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        reply.try_into()
    }
}
