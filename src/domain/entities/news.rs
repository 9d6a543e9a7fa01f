use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A headline returned by the gateway's news feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(headline: &str) -> Self {
        Self {
            headline: headline.to_string(),
            created_at: None,
        }
    }
}
