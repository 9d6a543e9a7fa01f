//! Brokerage Gateway Trait
//!
//! The strategy reads prices, account figures, positions and news through this
//! trait and submits orders through it. Keeping the broker behind a trait lets the
//! decision logic run against mocks in tests and against any broker in production.

use crate::domain::entities::account::AccountState;
use crate::domain::entities::news::NewsItem;
use crate::domain::entities::order::Order;
use crate::domain::entities::position::{find_open, PositionSnapshot};
use crate::domain::errors::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Common result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait BrokerageGateway: Send + Sync {
    /// Name of the broker, for logs
    fn name(&self) -> &str;

    /// Last traded price; `None` when the broker has no quote for the symbol
    async fn get_last_price(&self, symbol: &str) -> GatewayResult<Option<f64>>;

    async fn get_account(&self) -> GatewayResult<AccountState>;

    /// All open positions held in the account
    async fn get_positions(&self) -> GatewayResult<Vec<PositionSnapshot>>;

    /// Open position for one symbol
    async fn get_position(&self, symbol: &str) -> GatewayResult<Option<PositionSnapshot>> {
        let positions = self.get_positions().await?;
        Ok(find_open(&positions, symbol).cloned())
    }

    /// Headlines published for a symbol between `start` and `end`
    async fn get_news(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> GatewayResult<Vec<NewsItem>>;

    /// Submit an order, returning the broker-assigned order id
    async fn submit_order(&self, order: &Order) -> GatewayResult<String>;

    /// Whether the market is currently open
    async fn is_market_open(&self) -> GatewayResult<bool> {
        Ok(true)
    }
}
