//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug)]
pub struct Coupon {
    code: String,
    discount_percent: Option<Decimal>,
    discount_rupees: Option<Money>,
    min_order_amount: Money,
    max_uses: Option<u32>,
    used_count: u32,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

/// Terms an admin supplies when creating or editing a coupon.
#[derive(Clone, Debug, Default)]
pub struct CouponTerms {
    pub code: String,
    pub discount_percent: Option<Decimal>,
    pub discount_rupees: Option<Money>,
    pub min_order_amount: Money,
    pub max_uses: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Coupon codes are matched case-insensitively and stored uppercase.
pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

impl Coupon {
    pub fn new(terms: CouponTerms) -> Result<Self, CouponError> {
        let code = normalize_code(&terms.code);
        if code.len() < 3 || code.len() > 20 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CouponError::InvalidCode);
        }
        match (terms.discount_percent, terms.discount_rupees) {
            (None, None) => return Err(CouponError::NoDiscount),
            (Some(p), _) if p <= Decimal::ZERO || p > Decimal::ONE_HUNDRED => return Err(CouponError::InvalidPercent),
            (_, Some(r)) if r.is_zero() || r.amount().is_sign_negative() => return Err(CouponError::InvalidAmount),
            _ => {}
        }
        Ok(Self {
            code, discount_percent: terms.discount_percent, discount_rupees: terms.discount_rupees,
            min_order_amount: terms.min_order_amount, max_uses: terms.max_uses, used_count: 0,
            expires_at: terms.expires_at, is_active: terms.is_active,
        })
    }

    /// Rebuilds a stored coupon together with its usage counter.
    pub fn restore(terms: CouponTerms, used_count: u32) -> Result<Self, CouponError> {
        let mut coupon = Self::new(terms)?;
        coupon.used_count = used_count;
        Ok(coupon)
    }

    pub fn code(&self) -> &str { &self.code }
    pub fn used_count(&self) -> u32 { self.used_count }

    pub fn ensure_redeemable(&self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active { return Err(CouponError::Inactive); }
        if self.expires_at.is_some_and(|at| at <= now) { return Err(CouponError::Expired); }
        if self.max_uses.is_some_and(|max| self.used_count >= max) { return Err(CouponError::Exhausted); }
        Ok(())
    }

    /// Discount granted on `subtotal`. With both kinds configured the larger one
    /// wins; the result never exceeds the subtotal.
    pub fn discount_for(&self, subtotal: Money, now: DateTime<Utc>) -> Result<Money, CouponError> {
        self.ensure_redeemable(now)?;
        if subtotal < self.min_order_amount { return Err(CouponError::BelowMinimum(self.min_order_amount)); }
        let by_percent = self.discount_percent.map(|p| subtotal.percent(p)).unwrap_or(Money::ZERO);
        let by_rupees = self.discount_rupees.unwrap_or(Money::ZERO);
        Ok(by_percent.max(by_rupees).min(subtotal))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("Coupon code must be 3-20 letters or digits")]
    InvalidCode,
    #[error("Either a percentage or a rupee discount is required")]
    NoDiscount,
    #[error("Discount percentage must be between 0 and 100")]
    InvalidPercent,
    #[error("Discount amount must be positive")]
    InvalidAmount,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon usage limit reached")]
    Exhausted,
    #[error("Order total must be at least {0} to use this coupon")]
    BelowMinimum(Money),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn terms() -> CouponTerms {
        CouponTerms { code: "love10".into(), is_active: true, ..Default::default() }
    }

    #[test]
    fn test_requires_a_discount() {
        assert_eq!(Coupon::new(terms()).unwrap_err(), CouponError::NoDiscount);
        assert_eq!(Coupon::new(CouponTerms { discount_percent: Some(Decimal::new(150, 0)), ..terms() }).unwrap_err(), CouponError::InvalidPercent);
    }

    #[test]
    fn test_code_is_uppercased() {
        let c = Coupon::new(CouponTerms { discount_percent: Some(Decimal::TEN), ..terms() }).unwrap();
        assert_eq!(c.code(), "LOVE10");
    }

    #[test]
    fn test_percent_discount() {
        let c = Coupon::new(CouponTerms { discount_percent: Some(Decimal::TEN), ..terms() }).unwrap();
        assert_eq!(c.discount_for(Money::rupees(999), Utc::now()).unwrap().amount(), Decimal::new(9990, 2));
    }

    #[test]
    fn test_larger_discount_wins_and_caps_at_subtotal() {
        let c = Coupon::new(CouponTerms { discount_percent: Some(Decimal::TEN), discount_rupees: Some(Money::rupees(150)), ..terms() }).unwrap();
        assert_eq!(c.discount_for(Money::rupees(1000), Utc::now()).unwrap(), Money::rupees(150));
        assert_eq!(c.discount_for(Money::rupees(2000), Utc::now()).unwrap(), Money::rupees(200));
        assert_eq!(c.discount_for(Money::rupees(100), Utc::now()).unwrap(), Money::rupees(100));
    }

    #[test]
    fn test_redeemability() {
        let now = Utc::now();
        let expired = Coupon::new(CouponTerms { discount_rupees: Some(Money::rupees(50)), expires_at: Some(now - Duration::hours(1)), ..terms() }).unwrap();
        assert_eq!(expired.discount_for(Money::rupees(500), now), Err(CouponError::Expired));

        let used = Coupon::restore(CouponTerms { discount_rupees: Some(Money::rupees(50)), max_uses: Some(3), ..terms() }, 3).unwrap();
        assert_eq!(used.discount_for(Money::rupees(500), now), Err(CouponError::Exhausted));

        let minimum = Coupon::new(CouponTerms { discount_rupees: Some(Money::rupees(50)), min_order_amount: Money::rupees(499), ..terms() }).unwrap();
        assert_eq!(minimum.discount_for(Money::rupees(300), now), Err(CouponError::BelowMinimum(Money::rupees(499))));
    }
}
