//! Execution driver - turns a signal into at most one market order

use crate::domain::entities::order::{Order, OrderSide};
use crate::domain::entities::position::PositionSnapshot;
use crate::domain::entities::signal::{Signal, SignalKind};
use crate::domain::errors::{DeferReason, Outcome, StrategyError};
use crate::domain::repositories::brokerage_gateway::BrokerageGateway;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the driver did with a signal
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionReport {
    Submitted {
        order_id: String,
        side: OrderSide,
        quantity: f64,
    },
    NoAction,
}

pub struct ExecutionDriver {
    gateway: Arc<dyn BrokerageGateway>,
}

impl ExecutionDriver {
    pub fn new(gateway: Arc<dyn BrokerageGateway>) -> Self {
        Self { gateway }
    }

    /// Execute a signal for `symbol`.
    ///
    /// The position is re-read right before submitting: a buy goes out only if the
    /// symbol is still flat, a sell only if it is still held, for the quantity held at
    /// that moment. The re-read and the submission are separate gateway calls, so a
    /// position opened by someone else in between is not detected; two concurrent
    /// callers can both submit.
    pub async fn execute(&self, symbol: &str, signal: &Signal) -> Outcome<ExecutionReport> {
        if !signal.is_actionable() {
            return Outcome::Ready(ExecutionReport::NoAction);
        }

        let current = match self.gateway.get_position(symbol).await {
            Ok(position) => position.filter(|p| p.is_open()),
            Err(e) => {
                error!("Error checking position for {} before execution: {}", symbol, e);
                return Outcome::Failed(StrategyError::gateway(symbol, "get_position", e));
            }
        };

        match (signal.kind, current) {
            (SignalKind::Buy, None) => self.submit(symbol, OrderSide::Buy, signal.size).await,
            (SignalKind::Sell, Some(position)) => {
                if (position.quantity - signal.size).abs() > f64::EPSILON {
                    warn!(
                        "Position in {} changed from {} to {} shares, selling all held",
                        symbol, signal.size, position.quantity
                    );
                }
                self.submit(symbol, OrderSide::Sell, position.quantity).await
            }
            (SignalKind::Buy, Some(position)) => {
                info!(
                    "Already have position in {} ({} shares), skipping buy",
                    symbol, position.quantity
                );
                Outcome::Deferred(DeferReason::PositionChanged {
                    symbol: symbol.to_string(),
                })
            }
            (SignalKind::Sell, None) => {
                info!("No position left in {}, skipping sell", symbol);
                Outcome::Deferred(DeferReason::PositionChanged {
                    symbol: symbol.to_string(),
                })
            }
            (SignalKind::None, _) => Outcome::Ready(ExecutionReport::NoAction),
        }
    }

    /// Unconditional market sell of a whole position
    pub async fn liquidate(&self, position: &PositionSnapshot) -> Result<String, StrategyError> {
        let order = Order::market(&position.symbol, OrderSide::Sell, position.quantity)?;
        self.gateway
            .submit_order(&order)
            .await
            .map_err(|e| StrategyError::gateway(&position.symbol, "submit_order", e))
    }

    async fn submit(&self, symbol: &str, side: OrderSide, quantity: f64) -> Outcome<ExecutionReport> {
        let order = match Order::market(symbol, side, quantity) {
            Ok(order) => order,
            Err(e) => {
                error!("Invalid {} order for {}: {}", side, symbol, e);
                return Outcome::Failed(e.into());
            }
        };

        match self.gateway.submit_order(&order).await {
            Ok(order_id) => {
                info!(
                    "{} order placed for {}: {} shares at market price (order {})",
                    side, symbol, quantity, order_id
                );
                Outcome::Ready(ExecutionReport::Submitted {
                    order_id,
                    side,
                    quantity,
                })
            }
            Err(e) => {
                error!("Error placing {} order for {}: {}", side, symbol, e);
                Outcome::Failed(StrategyError::gateway(symbol, "submit_order", e))
            }
        }
    }
}
