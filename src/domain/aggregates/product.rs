//! Product Aggregate

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// Purchasable view of a catalog product, as cart, hamper and checkout see it.
#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Money,
    pub hamper_price: Option<Money>,
    pub is_hamper_eligible: bool,
    pub is_active: bool,
    pub stock: i32,
    pub image: Option<String>,
}

impl Product {
    /// Hamper builds use the dedicated hamper price when one is set.
    pub fn hamper_unit_price(&self) -> Money { self.hamper_price.unwrap_or(self.price) }

    pub fn ensure_purchasable(&self, quantity: u32) -> Result<(), ProductError> {
        if !self.is_active { return Err(ProductError::Unavailable); }
        if i64::from(quantity) > i64::from(self.stock) {
            return Err(ProductError::InsufficientStock { available: self.stock.max(0) as u32 });
        }
        Ok(())
    }

    /// Units that can still be bought, zero for inactive products.
    pub fn available(&self) -> u32 {
        if self.is_active { self.stock.max(0) as u32 } else { 0 }
    }

    pub fn ensure_hamper_eligible(&self) -> Result<(), ProductError> {
        if !self.is_hamper_eligible { return Err(ProductError::NotHamperEligible); }
        Ok(())
    }
}

/// Checks applied when an admin creates or edits a product.
pub fn validate_pricing(price: Money, compare_at_price: Option<Money>, is_hamper_eligible: bool, hamper_price: Option<Money>) -> Result<(), ProductError> {
    if price.amount().is_sign_negative() { return Err(ProductError::InvalidPrice("price cannot be negative")); }
    if let Some(compare) = compare_at_price {
        if compare < price { return Err(ProductError::InvalidPrice("compare-at price must not be below price")); }
    }
    if hamper_price.is_some() && !is_hamper_eligible {
        return Err(ProductError::InvalidPrice("hamper price requires a hamper eligible product"));
    }
    if let Some(hp) = hamper_price {
        if hp.amount().is_sign_negative() || hp.is_zero() { return Err(ProductError::InvalidPrice("hamper price must be positive")); }
    }
    Ok(())
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("Product is not available")]
    Unavailable,
    #[error("Only {available} left in stock")]
    InsufficientStock { available: u32 },
    #[error("Product cannot be added to a custom hamper")]
    NotHamperEligible,
    #[error("Invalid pricing: {0}")]
    InvalidPrice(&'static str),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(price: i64, stock: i32) -> Product {
        Product { id: Uuid::new_v4(), name: "Rose Candle".into(), price: Money::rupees(price), hamper_price: None, is_hamper_eligible: false, is_active: true, stock, image: None }
    }

    #[test]
    fn test_hamper_unit_price_prefers_hamper_price() {
        let mut p = product(300, 5);
        assert_eq!(p.hamper_unit_price(), Money::rupees(300));
        p.hamper_price = Some(Money::rupees(250));
        assert_eq!(p.hamper_unit_price(), Money::rupees(250));
    }

    #[test]
    fn test_purchasable() {
        let mut p = product(100, 2);
        assert!(p.ensure_purchasable(2).is_ok());
        assert_eq!(p.ensure_purchasable(3), Err(ProductError::InsufficientStock { available: 2 }));
        assert_eq!(p.available(), 2);
        p.is_active = false;
        assert_eq!(p.ensure_purchasable(1), Err(ProductError::Unavailable));
        assert_eq!(p.available(), 0);
    }

    #[test]
    fn test_validate_pricing() {
        assert!(validate_pricing(Money::rupees(100), Some(Money::rupees(120)), true, Some(Money::rupees(90))).is_ok());
        assert!(validate_pricing(Money::rupees(100), Some(Money::rupees(80)), false, None).is_err());
        assert!(validate_pricing(Money::rupees(100), None, false, Some(Money::rupees(90))).is_err());
    }
}
