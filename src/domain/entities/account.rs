use serde::{Deserialize, Serialize};

/// Account figures used for sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub cash: f64,
    pub buying_power: f64,
    pub portfolio_value: f64,
}

impl AccountState {
    pub fn new(cash: f64, buying_power: f64, portfolio_value: f64) -> Self {
        Self {
            cash,
            buying_power,
            portfolio_value,
        }
    }
}
