use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

/// Order handed to the brokerage gateway
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Client-side identifier
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub limit_price: Option<Price>,
    pub stop_price: Option<Price>,
}

impl Order {
    pub fn new(
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        quantity: f64,
        limit_price: Option<f64>,
        stop_price: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol("symbol cannot be empty".to_string()));
        }

        let quantity = Quantity::new(quantity)?;
        if quantity.is_zero() {
            return Err(ValidationError::InvalidQuantity(
                "order quantity must be positive".to_string(),
            ));
        }

        let limit_price = limit_price.map(Price::new).transpose()?;
        let stop_price = stop_price.map(Price::new).transpose()?;

        match order_type {
            OrderType::Limit if limit_price.is_none() => {
                return Err(ValidationError::InvalidOrder(
                    "Limit orders must have a limit price".to_string(),
                ));
            }
            OrderType::Stop if stop_price.is_none() => {
                return Err(ValidationError::InvalidOrder(
                    "Stop orders must have a stop price".to_string(),
                ));
            }
            _ => {}
        }

        Ok(Order {
            id: format!("sent_{}_{}", symbol, Utc::now().timestamp_millis()),
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            limit_price,
            stop_price,
        })
    }

    pub fn market(symbol: &str, side: OrderSide, quantity: f64) -> Result<Self, ValidationError> {
        Self::new(symbol, side, OrderType::Market, quantity, None, None)
    }
}
