//! Value Objects for the storefront

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Indian mobile numbers: ten digits starting with 6-9.
pub static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[6-9][0-9]{9}$").expect("valid phone regex"));

/// Six digit PIN code, never starting with zero.
pub static PINCODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9][0-9]{5}$").expect("valid pincode regex"));

/// Money value object. Every amount in the store is INR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount.round_dp(2)) }
    pub fn rupees(amount: i64) -> Self { Self(Decimal::from(amount)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    pub fn add(&self, other: Money) -> Money { Money(self.0 + other.0) }

    /// Subtraction floored at zero.
    pub fn subtract(&self, other: Money) -> Money {
        if other.0 >= self.0 { Money::ZERO } else { Money(self.0 - other.0) }
    }

    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }

    /// `p` percent of this amount, rounded half-up to paise.
    pub fn percent(&self, p: Decimal) -> Money {
        Money((self.0 * p / Decimal::ONE_HUNDRED).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Amount in paise, as the payment gateways expect it.
    pub fn to_paise(&self) -> i64 {
        (self.0 * Decimal::ONE_HUNDRED).round().try_into().unwrap_or(i64::MAX)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self { Money::new(value) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "₹{:.2}", self.0) }
}

/// Quantity requested for a single cart or hamper line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);
    pub const MAX: u32 = 99;

    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        if value > Self::MAX { return Err(QuantityError::TooLarge); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Quantity::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("Quantity must be at least 1")]
    Zero,
    #[error("Quantity cannot be more than {}", Quantity::MAX)]
    TooLarge,
}

/// Verified-format phone number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phone(String);

impl Phone {
    pub fn parse(value: &str) -> Result<Self, ContactError> {
        let digits: String = value.trim().trim_start_matches("+91").chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        if !PHONE_RE.is_match(&digits) { return Err(ContactError::InvalidPhone); }
        Ok(Self(digits))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

/// Postal index number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pincode(String);

impl Pincode {
    pub fn parse(value: &str) -> Result<Self, ContactError> {
        let value = value.trim();
        if !PINCODE_RE.is_match(value) { return Err(ContactError::InvalidPincode); }
        Ok(Self(value.to_string()))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContactError {
    #[error("Phone number must be a valid 10 digit mobile number")]
    InvalidPhone,
    #[error("Pincode must be a valid 6 digit PIN code")]
    InvalidPincode,
}

/// Human readable order reference, e.g. `TLC20240314-7K2QX9`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| (c as char).to_ascii_uppercase())
            .collect();
        Self(format!("TLC{}-{}", at.format("%Y%m%d"), suffix))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_percent_rounds_to_paise() {
        let m = Money::new(Decimal::new(99999, 2));
        assert_eq!(m.percent(Decimal::new(15, 0)).amount(), Decimal::new(15000, 2));
        assert_eq!(Money::rupees(333).percent(Decimal::new(10, 0)).amount(), Decimal::new(3330, 2));
    }

    #[test]
    fn test_money_subtract_floors_at_zero() {
        assert_eq!(Money::rupees(100).subtract(Money::rupees(150)), Money::ZERO);
        assert_eq!(Money::rupees(100).subtract(Money::rupees(40)), Money::rupees(60));
    }

    #[test]
    fn test_to_paise() { assert_eq!(Money::new(Decimal::new(49950, 2)).to_paise(), 49950); }

    #[test]
    fn test_phone() {
        assert_eq!(Phone::parse("+91 98765 43210").unwrap().as_str(), "9876543210");
        assert!(Phone::parse("1234567890").is_err());
        assert!(Phone::parse("98765").is_err());
    }

    #[test]
    fn test_pincode() {
        assert!(Pincode::parse("560001").is_ok());
        assert!(Pincode::parse("060001").is_err());
        assert!(Pincode::parse("56001").is_err());
    }

    #[test]
    fn test_order_number_shape() {
        let at = DateTime::parse_from_rfc3339("2024-03-14T10:00:00Z").unwrap().with_timezone(&Utc);
        let n = OrderNumber::generate(at);
        assert!(n.as_str().starts_with("TLC20240314-"));
        assert_eq!(n.as_str().len(), "TLC20240314-".len() + 6);
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
        assert_eq!(Quantity::new(Quantity::MAX + 1), Err(QuantityError::TooLarge));
        assert_eq!(Quantity::new(3).unwrap().value(), 3);
    }

    #[test]
    fn test_quantity_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Quantity>("4294967295").is_err());
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("7").unwrap().value(), 7);
    }
}
