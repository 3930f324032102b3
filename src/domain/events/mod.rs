//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::order::{OrderStatus, PaymentMethod};

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
    User(UserEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, user_id: Uuid, total: Decimal, payment_method: PaymentMethod },
    Paid { order_id: Uuid, total: Decimal },
    PaymentFailed { order_id: Uuid },
    StatusChanged { order_id: Uuid, user_id: Uuid, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserEvent {
    Registered { user_id: Uuid, email: String },
    PhoneVerified { user_id: Uuid },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::Order(OrderEvent::Placed { .. }) => "lovecraft.orders.placed",
            DomainEvent::Order(OrderEvent::Paid { .. }) => "lovecraft.orders.paid",
            DomainEvent::Order(OrderEvent::PaymentFailed { .. }) => "lovecraft.orders.payment_failed",
            DomainEvent::Order(OrderEvent::StatusChanged { .. }) => "lovecraft.orders.status_changed",
            DomainEvent::User(UserEvent::Registered { .. }) => "lovecraft.users.registered",
            DomainEvent::User(UserEvent::PhoneVerified { .. }) => "lovecraft.users.phone_verified",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_carries_type_tag() {
        let e = DomainEvent::Order(OrderEvent::StatusChanged { order_id: Uuid::nil(), user_id: Uuid::nil(), from: OrderStatus::Processing, to: OrderStatus::Shipped });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["to"], "shipped");
        assert_eq!(e.subject(), "lovecraft.orders.status_changed");
    }
}
