//! Transient trading decision passed from the signal generator to the execution driver

use crate::domain::value_objects::price::Price;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Buy,
    Sell,
    None,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::None => write!(f, "HOLD"),
        }
    }
}

/// Decision for one symbol in one iteration. `size` is in shares.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub size: f64,
    pub price: Price,
    /// Advisory only, orders are submitted without a bracket
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
}

impl Signal {
    pub fn hold(price: Price) -> Self {
        Self {
            kind: SignalKind::None,
            size: 0.0,
            price,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn buy(size: f64, price: Price, stop_loss: Price, take_profit: Price) -> Self {
        Self {
            kind: SignalKind::Buy,
            size,
            price,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        }
    }

    pub fn sell(size: f64, price: Price) -> Self {
        Self {
            kind: SignalKind::Sell,
            size,
            price,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.kind != SignalKind::None && self.size > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_is_not_actionable() {
        let signal = Signal::hold(Price::new(10.0).unwrap());
        assert!(!signal.is_actionable());
        assert_eq!(signal.kind.to_string(), "HOLD");
    }

    #[test]
    fn test_buy_carries_brackets() {
        let price = Price::new(50.0).unwrap();
        let signal = Signal::buy(
            225.0,
            price,
            Price::new(49.0).unwrap(),
            Price::new(52.5).unwrap(),
        );
        assert!(signal.is_actionable());
        assert_eq!(signal.stop_loss.map(|p| p.value()), Some(49.0));
        assert_eq!(signal.take_profit.map(|p| p.value()), Some(52.5));
    }
}
