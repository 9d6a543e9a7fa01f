use crate::domain::errors::ValidationError;

/// Number of shares; fractional quantities are allowed
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quantity(f64);

impl Quantity {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value >= 0.0 {
            Ok(Quantity(value))
        } else {
            Err(ValidationError::InvalidQuantity(format!(
                "quantity must be non-negative, got {}",
                value
            )))
        }
    }

    /// Shares purchasable for a notional amount at a price
    pub fn from_notional(notional: f64, price: f64) -> Result<Self, ValidationError> {
        if price <= 0.0 {
            return Err(ValidationError::InvalidPrice(format!(
                "cannot convert notional at price {}",
                price
            )));
        }
        Quantity::new(notional / price)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_new_valid() {
        let qty = Quantity::new(100.0).unwrap();
        assert_eq!(qty.value(), 100.0);
        assert!(!qty.is_zero());
    }

    #[test]
    fn test_quantity_new_negative() {
        assert!(matches!(
            Quantity::new(-5.0),
            Err(ValidationError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_quantity_from_notional() {
        let qty = Quantity::from_notional(11_250.0, 50.0).unwrap();
        assert!((qty.value() - 225.0).abs() < 1e-9);
    }

    #[test]
    fn test_quantity_from_notional_zero_price() {
        assert!(Quantity::from_notional(1000.0, 0.0).is_err());
    }
}
