use serde::{Deserialize, Serialize};

/// Read-only view of an open position as reported by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub quantity: f64,
    pub market_value: f64,
}

impl PositionSnapshot {
    pub fn new(symbol: &str, quantity: f64, market_value: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            market_value,
        }
    }

    /// Only long positions count as held by this strategy
    pub fn is_open(&self) -> bool {
        self.quantity > 0.0
    }
}

/// Find the open position for a symbol in a gateway listing
pub fn find_open<'a>(positions: &'a [PositionSnapshot], symbol: &str) -> Option<&'a PositionSnapshot> {
    positions
        .iter()
        .find(|p| p.symbol == symbol && p.is_open())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_open() {
        assert!(PositionSnapshot::new("AAPL", 10.0, 1500.0).is_open());
        assert!(!PositionSnapshot::new("AAPL", 0.0, 0.0).is_open());
    }

    #[test]
    fn test_find_open_skips_flat_entries() {
        let positions = vec![
            PositionSnapshot::new("AAPL", 0.0, 0.0),
            PositionSnapshot::new("MSFT", 5.0, 2000.0),
        ];
        assert!(find_open(&positions, "AAPL").is_none());
        assert_eq!(find_open(&positions, "MSFT").map(|p| p.quantity), Some(5.0));
        assert!(find_open(&positions, "TSLA").is_none());
    }
}
