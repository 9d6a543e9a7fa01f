use std::fmt;
use thiserror::Error;

/// Errors raised by a brokerage gateway call
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Order placement failed: {0}")]
    OrderPlacementFailed(String),

    #[error("Account query failed: {0}")]
    AccountQueryFailed(String),

    #[error("Position query failed: {0}")]
    PositionQueryFailed(String),

    #[error("Market data unavailable: {0}")]
    MarketDataFailed(String),

    #[error("News query failed: {0}")]
    NewsQueryFailed(String),

    #[error("Failed to parse gateway response: {0}")]
    ParseError(String),
}

/// Errors raised by the sentiment oracle
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("Sentiment service unreachable: {0}")]
    Unreachable(String),

    #[error("Sentiment service returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unknown sentiment label: {0}")]
    UnknownLabel(String),

    #[error("Probability {0} outside [0, 1]")]
    ProbabilityOutOfRange(f64),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Value must be finite")]
    MustBeFinite,
}

/// Configuration problems, fatal at startup
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No symbols specified for trading")]
    NoSymbols,

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
}

/// Why a step was postponed instead of producing a value
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeferReason {
    #[error("insufficient price history for {symbol}: need 2 samples, have {have}")]
    InsufficientPriceHistory { symbol: String, have: usize },

    #[error("no price available for {symbol}")]
    PriceUnavailable { symbol: String },

    #[error("no buying power available for {symbol} (buying power {buying_power:.2})")]
    NoBuyingPower { symbol: String, buying_power: f64 },

    #[error("position for {symbol} changed before execution")]
    PositionChanged { symbol: String },
}

/// Top-level error of the strategy
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Gateway call {operation} failed for {symbol}: {source}")]
    Gateway {
        symbol: String,
        operation: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("Sentiment analysis failed for {symbol}: {source}")]
    Oracle {
        symbol: String,
        #[source]
        source: OracleError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Broker connectivity check failed: {0}")]
    Connectivity(GatewayError),

    #[error("Strategy has not been started")]
    NotStarted,
}

impl StrategyError {
    pub fn gateway(symbol: &str, operation: &'static str, source: GatewayError) -> Self {
        StrategyError::Gateway {
            symbol: symbol.to_string(),
            operation,
            source,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StrategyError::Validation(_) => ErrorSeverity::Minor,
            StrategyError::Oracle { .. } => ErrorSeverity::Minor,
            StrategyError::Gateway { .. } => ErrorSeverity::Moderate,
            StrategyError::Config(_) => ErrorSeverity::Critical,
            StrategyError::Connectivity(_) => ErrorSeverity::Critical,
            StrategyError::NotStarted => ErrorSeverity::Critical,
        }
    }

    /// Whether the next iteration may succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StrategyError::Gateway { .. } | StrategyError::Oracle { .. } | StrategyError::Validation(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Minor,
    Moderate,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Minor => write!(f, "Minor"),
            ErrorSeverity::Moderate => write!(f, "Moderate"),
            ErrorSeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// Result of a step that can also be postponed
///
/// `Deferred` means "no data yet, try again next iteration"; `Failed` is a hard
/// failure that callers log at the symbol boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    Deferred(DeferReason),
    Failed(StrategyError),
}

impl<T> Outcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}
