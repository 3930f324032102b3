//! Checkout pricing rules

use serde::Serialize;
use crate::domain::aggregates::order::PaymentMethod;
use crate::domain::value_objects::Money;

/// Prepaid orders at or above this subtotal ship free.
pub const FREE_DELIVERY_THRESHOLD: i64 = 500;
pub const FLAT_DELIVERY_CHARGE: i64 = 80;

pub fn delivery_charge(method: PaymentMethod, subtotal: Money) -> Money {
    if method == PaymentMethod::Online && subtotal >= Money::rupees(FREE_DELIVERY_THRESHOLD) {
        Money::ZERO
    } else {
        Money::rupees(FLAT_DELIVERY_CHARGE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutQuote {
    pub subtotal: Money,
    pub discount: Money,
    pub delivery_charge: Money,
    pub total: Money,
}

/// `discount` is clamped to the subtotal; delivery is charged on the undiscounted subtotal.
pub fn quote(subtotal: Money, method: PaymentMethod, discount: Money) -> CheckoutQuote {
    let discount = discount.min(subtotal);
    let delivery_charge = delivery_charge(method, subtotal);
    CheckoutQuote { subtotal, discount, delivery_charge, total: subtotal.subtract(discount).add(delivery_charge) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_charge() {
        assert_eq!(delivery_charge(PaymentMethod::Online, Money::rupees(500)), Money::ZERO);
        assert_eq!(delivery_charge(PaymentMethod::Online, Money::rupees(1200)), Money::ZERO);
        assert_eq!(delivery_charge(PaymentMethod::Online, Money::rupees(499)), Money::rupees(80));
        assert_eq!(delivery_charge(PaymentMethod::Cod, Money::rupees(500)), Money::rupees(80));
        assert_eq!(delivery_charge(PaymentMethod::Cod, Money::rupees(100)), Money::rupees(80));
    }

    #[test]
    fn test_quote_totals() {
        let q = quote(Money::rupees(600), PaymentMethod::Online, Money::rupees(60));
        assert_eq!(q.delivery_charge, Money::ZERO);
        assert_eq!(q.total, Money::rupees(540));

        let q = quote(Money::rupees(300), PaymentMethod::Cod, Money::rupees(500));
        assert_eq!(q.discount, Money::rupees(300));
        assert_eq!(q.total, Money::rupees(80));
    }
}
