use crate::domain::errors::ConfigError;
use crate::domain::services::position_sizer::SizingConfig;
use crate::domain::services::risk_manager::RiskConfig;
use crate::domain::services::signal_generator::SignalConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

/// Strategy parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub symbols: Vec<String>,
    pub sentiment_threshold: f64, // Single cutoff for entries and exits
    pub position_size: f64,       // Base position as a fraction of portfolio value
    pub max_position_size: f64,   // Hard cap as a fraction of portfolio value
    pub stop_loss: f64,           // Advisory stop distance (0.02 = 2% below entry)
    pub take_profit: f64,         // Advisory target distance (0.05 = 5% above entry)
    pub sentiment_window: usize,
    pub price_history_window: usize,
    pub max_portfolio_risk: f64,
    pub max_position_risk: f64,
    pub max_correlation: f64,
    pub news_lookback_days: i64,
    pub iteration_interval_seconds: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["SPY".to_string()],
            sentiment_threshold: 0.6,
            position_size: 0.1,
            max_position_size: 0.25,
            stop_loss: 0.02,
            take_profit: 0.05,
            sentiment_window: 5,
            price_history_window: 30,
            max_portfolio_risk: 0.02,
            max_position_risk: 0.01,
            max_correlation: 0.7,
            news_lookback_days: 3,
            iteration_interval_seconds: 3600, // Hourly
        }
    }
}

/// Parse `name` from `lookup` into `target` if present and accepted by `valid`.
/// Invalid values are logged and the current value is kept.
fn override_from<T, F>(
    lookup: &F,
    name: &str,
    target: &mut T,
    valid: impl Fn(&T) -> bool,
    expectation: &str,
) where
    T: FromStr + fmt::Display,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => *target = value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} (must be {}), using default: {}",
                name,
                value,
                expectation,
                target
            );
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {}",
                name,
                raw,
                e,
                target
            );
        }
    }
}

fn is_fraction(value: &f64) -> bool {
    value.is_finite() && *value > 0.0 && *value <= 1.0
}

impl StrategyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any key/value source, starting from the defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(symbols) = lookup("TRADING_SYMBOLS") {
            let parsed: Vec<String> = symbols
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if parsed.is_empty() {
                tracing::warn!(
                    "TRADING_SYMBOLS is empty, using default: {}",
                    config.symbols.join(",")
                );
            } else {
                config.symbols = parsed;
            }
        }

        override_from(
            &lookup,
            "SENTIMENT_THRESHOLD",
            &mut config.sentiment_threshold,
            |v| (0.0..1.0).contains(v),
            "between 0.0 and 1.0",
        );
        override_from(
            &lookup,
            "POSITION_SIZE",
            &mut config.position_size,
            is_fraction,
            "in (0, 1]",
        );
        override_from(
            &lookup,
            "MAX_POSITION_SIZE",
            &mut config.max_position_size,
            is_fraction,
            "in (0, 1]",
        );
        override_from(
            &lookup,
            "STOP_LOSS",
            &mut config.stop_loss,
            |v| *v > 0.0 && *v < 1.0,
            "between 0.0 and 1.0",
        );
        override_from(
            &lookup,
            "TAKE_PROFIT",
            &mut config.take_profit,
            |v| v.is_finite() && *v > 0.0,
            "positive",
        );
        override_from(
            &lookup,
            "SENTIMENT_WINDOW",
            &mut config.sentiment_window,
            |v| (1..=100).contains(v),
            "between 1 and 100",
        );
        override_from(
            &lookup,
            "PRICE_HISTORY_WINDOW",
            &mut config.price_history_window,
            |v| (2..=1000).contains(v),
            "between 2 and 1000",
        );
        override_from(
            &lookup,
            "MAX_PORTFOLIO_RISK",
            &mut config.max_portfolio_risk,
            is_fraction,
            "in (0, 1]",
        );
        override_from(
            &lookup,
            "MAX_POSITION_RISK",
            &mut config.max_position_risk,
            is_fraction,
            "in (0, 1]",
        );
        override_from(
            &lookup,
            "MAX_CORRELATION",
            &mut config.max_correlation,
            is_fraction,
            "in (0, 1]",
        );
        override_from(
            &lookup,
            "NEWS_LOOKBACK_DAYS",
            &mut config.news_lookback_days,
            |v| (1..=30).contains(v),
            "between 1 and 30",
        );
        override_from(
            &lookup,
            "ITERATION_INTERVAL_SECONDS",
            &mut config.iteration_interval_seconds,
            |v| (10..=86_400).contains(v),
            "between 10 and 86400",
        );

        config
    }

    /// Reject combinations the individual range checks cannot catch
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if !(0.0..1.0).contains(&self.sentiment_threshold) {
            return Err(ConfigError::InvalidParameter {
                name: "sentiment_threshold",
                reason: format!("must be in [0, 1), got {}", self.sentiment_threshold),
            });
        }
        for (name, value) in [
            ("position_size", self.position_size),
            ("max_position_size", self.max_position_size),
        ] {
            if !is_fraction(&value) {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be in (0, 1], got {}", value),
                });
            }
        }
        if self.position_size > self.max_position_size {
            return Err(ConfigError::InvalidParameter {
                name: "position_size",
                reason: format!(
                    "base size {} exceeds max_position_size {}",
                    self.position_size, self.max_position_size
                ),
            });
        }
        if !(self.stop_loss > 0.0 && self.stop_loss < 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "stop_loss",
                reason: format!("must be in (0, 1), got {}", self.stop_loss),
            });
        }
        if !(self.take_profit.is_finite() && self.take_profit > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "take_profit",
                reason: format!("must be positive, got {}", self.take_profit),
            });
        }
        if self.sentiment_window == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "sentiment_window",
                reason: "must hold at least one observation".to_string(),
            });
        }
        if self.price_history_window < 2 {
            return Err(ConfigError::InvalidParameter {
                name: "price_history_window",
                reason: "must hold at least two samples".to_string(),
            });
        }
        self.risk().validate()
    }

    pub fn sizing(&self) -> SizingConfig {
        SizingConfig {
            sentiment_threshold: self.sentiment_threshold,
            position_size: self.position_size,
            max_position_size: self.max_position_size,
        }
    }

    pub fn signal(&self) -> SignalConfig {
        SignalConfig {
            sentiment_threshold: self.sentiment_threshold,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
        }
    }

    pub fn risk(&self) -> RiskConfig {
        RiskConfig {
            max_portfolio_risk: self.max_portfolio_risk,
            max_position_risk: self.max_position_risk,
            max_correlation: self.max_correlation,
        }
    }

    pub fn iteration_interval(&self) -> Duration {
        Duration::from_secs(self.iteration_interval_seconds)
    }
}

pub const ALPACA_PAPER_URL: &str = "https://paper-api.alpaca.markets";
pub const ALPACA_LIVE_URL: &str = "https://api.alpaca.markets";
pub const ALPACA_DATA_URL: &str = "https://data.alpaca.markets";

/// Alpaca credentials and endpoints
#[derive(Clone)]
pub struct BrokerConfig {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
    pub paper: bool,
    pub trading_base_url: String,
    pub data_base_url: String,
    pub requests_per_minute: u32,
    pub timeout: Duration,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("paper", &self.paper)
            .field("trading_base_url", &self.trading_base_url)
            .field("data_base_url", &self.data_base_url)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
        };

        let api_key = required("ALPACA_API_KEY")?;
        let api_secret = Zeroizing::new(required("ALPACA_API_SECRET")?);

        // Paper trading unless explicitly disabled
        let paper = lookup("ALPACA_PAPER")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let default_trading = if paper { ALPACA_PAPER_URL } else { ALPACA_LIVE_URL };
        let trading_base_url =
            lookup("ALPACA_TRADING_URL").unwrap_or_else(|| default_trading.to_string());
        let data_base_url = lookup("ALPACA_DATA_URL").unwrap_or_else(|| ALPACA_DATA_URL.to_string());

        let mut requests_per_minute = 200u32;
        override_from(
            &lookup,
            "ALPACA_REQUESTS_PER_MINUTE",
            &mut requests_per_minute,
            |v| (1..=10_000).contains(v),
            "between 1 and 10000",
        );

        let mut timeout_seconds = 30u64;
        override_from(
            &lookup,
            "ALPACA_TIMEOUT_SECONDS",
            &mut timeout_seconds,
            |v| (1..=300).contains(v),
            "between 1 and 300",
        );

        Ok(Self {
            api_key,
            api_secret,
            paper,
            trading_base_url: trading_base_url.trim_end_matches('/').to_string(),
            data_base_url: data_base_url.trim_end_matches('/').to_string(),
            requests_per_minute,
            timeout: Duration::from_secs(timeout_seconds),
        })
    }
}

/// Location of the headline scoring service
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/sentiment".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl OracleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("SENTIMENT_ORACLE_URL").filter(|v| !v.trim().is_empty()) {
            config.url = url.trim().to_string();
        }
        let mut timeout_seconds = config.timeout.as_secs();
        override_from(
            &lookup,
            "SENTIMENT_ORACLE_TIMEOUT_SECONDS",
            &mut timeout_seconds,
            |v| (1..=300).contains(v),
            "between 1 and 300",
        );
        config.timeout = Duration::from_secs(timeout_seconds);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StrategyConfig::default();
        assert_eq!(config.sentiment_threshold, 0.6);
        assert_eq!(config.position_size, 0.1);
        assert_eq!(config.max_position_size, 0.25);
        assert_eq!(config.stop_loss, 0.02);
        assert_eq!(config.take_profit, 0.05);
        assert_eq!(config.sentiment_window, 5);
        assert_eq!(config.price_history_window, 30);
        assert_eq!(config.max_portfolio_risk, 0.02);
        assert_eq!(config.max_position_risk, 0.01);
        assert_eq!(config.max_correlation, 0.7);
        assert_eq!(config.iteration_interval(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = StrategyConfig::from_lookup(lookup(&[
            ("TRADING_SYMBOLS", "aapl, msft,,tsla "),
            ("SENTIMENT_THRESHOLD", "0.7"),
            ("SENTIMENT_WINDOW", "8"),
            ("ITERATION_INTERVAL_SECONDS", "900"),
        ]));
        assert_eq!(config.symbols, vec!["AAPL", "MSFT", "TSLA"]);
        assert_eq!(config.sentiment_threshold, 0.7);
        assert_eq!(config.sentiment_window, 8);
        assert_eq!(config.iteration_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = StrategyConfig::from_lookup(lookup(&[
            ("SENTIMENT_THRESHOLD", "1.5"),
            ("POSITION_SIZE", "abc"),
            ("STOP_LOSS", "-0.1"),
            ("TRADING_SYMBOLS", " , "),
        ]));
        assert_eq!(config, StrategyConfig::default());
    }

    #[test]
    fn test_validate_rejects_inconsistent_config() {
        let config = StrategyConfig {
            symbols: vec![],
            ..StrategyConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoSymbols));

        let config = StrategyConfig {
            position_size: 0.3,
            max_position_size: 0.2,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "position_size", .. })
        ));

        let config = StrategyConfig {
            max_position_risk: 0.5,
            ..StrategyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_component_configs() {
        let config = StrategyConfig::default();
        assert_eq!(config.sizing(), SizingConfig::default());
        assert_eq!(config.signal(), SignalConfig::default());
        assert_eq!(config.risk(), RiskConfig::default());
    }

    #[test]
    fn test_broker_config_requires_credentials() {
        let err = BrokerConfig::from_lookup(lookup(&[("ALPACA_API_KEY", "key")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVariable("ALPACA_API_SECRET".to_string()));
    }

    #[test]
    fn test_broker_config_paper_by_default_and_redacted() {
        let config = BrokerConfig::from_lookup(lookup(&[
            ("ALPACA_API_KEY", "key"),
            ("ALPACA_API_SECRET", "hunter2"),
        ]))
        .unwrap();
        assert!(config.paper);
        assert_eq!(config.trading_base_url, ALPACA_PAPER_URL);
        assert_eq!(config.data_base_url, ALPACA_DATA_URL);
        assert_eq!(config.api_secret.as_str(), "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_broker_config_live() {
        let config = BrokerConfig::from_lookup(lookup(&[
            ("ALPACA_API_KEY", "key"),
            ("ALPACA_API_SECRET", "secret"),
            ("ALPACA_PAPER", "false"),
        ]))
        .unwrap();
        assert!(!config.paper);
        assert_eq!(config.trading_base_url, ALPACA_LIVE_URL);
    }

    #[test]
    fn test_oracle_config() {
        assert_eq!(OracleConfig::from_lookup(lookup(&[])), OracleConfig::default());
        let config = OracleConfig::from_lookup(lookup(&[(
            "SENTIMENT_ORACLE_URL",
            "http://scorer:9000/score",
        )]));
        assert_eq!(config.url, "http://scorer:9000/score");
    }
}
