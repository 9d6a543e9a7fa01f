use crate::domain::errors::ValidationError;

/// Non-negative, finite market price
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value >= 0.0 {
            Ok(Price(value))
        } else {
            Err(ValidationError::InvalidPrice(format!(
                "price must be non-negative, got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Price moved by a signed fraction, e.g. `-0.02` for a 2% stop below
    pub fn offset_by(&self, fraction: f64) -> Result<Price, ValidationError> {
        if !fraction.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        Price::new(self.0 * (1.0 + fraction))
    }
}
