//! Sentiment value objects produced by the oracle

use crate::domain::errors::OracleError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Categorical sentiment label
///
/// The declaration order is also the tie-break order used when counting
/// majority labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            other => Err(OracleError::UnknownLabel(other.to_string())),
        }
    }
}

/// One oracle verdict for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentObservation {
    pub probability: f64,
    pub label: SentimentLabel,
}

impl SentimentObservation {
    pub fn new(probability: f64, label: SentimentLabel) -> Result<Self, OracleError> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(OracleError::ProbabilityOutOfRange(probability));
        }
        Ok(Self { probability, label })
    }

    /// Verdict used when there is nothing to score
    pub fn neutral() -> Self {
        Self {
            probability: 0.0,
            label: SentimentLabel::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing() {
        assert_eq!("positive".parse::<SentimentLabel>(), Ok(SentimentLabel::Positive));
        assert_eq!(" Negative ".parse::<SentimentLabel>(), Ok(SentimentLabel::Negative));
        assert!(matches!(
            "bullish".parse::<SentimentLabel>(),
            Err(OracleError::UnknownLabel(_))
        ));
    }

    #[test]
    fn test_label_serde_lowercase() {
        let json = serde_json::to_string(&SentimentLabel::Neutral).unwrap();
        assert_eq!(json, "\"neutral\"");
    }

    #[test]
    fn test_observation_rejects_out_of_range() {
        assert!(SentimentObservation::new(1.2, SentimentLabel::Positive).is_err());
        assert!(SentimentObservation::new(-0.1, SentimentLabel::Negative).is_err());
        assert!(SentimentObservation::new(f64::NAN, SentimentLabel::Neutral).is_err());
        assert!(SentimentObservation::new(1.0, SentimentLabel::Positive).is_ok());
    }

    #[test]
    fn test_neutral_observation() {
        let obs = SentimentObservation::neutral();
        assert_eq!(obs.probability, 0.0);
        assert_eq!(obs.label, SentimentLabel::Neutral);
    }
}
