//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::CheckoutQuote;
use crate::domain::value_objects::{Money, OrderNumber, Phone, Pincode, PHONE_RE, PINCODE_RE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus { Pending, Processing, Shipped, Delivered, Cancelled, Failed }

impl OrderStatus {
    /// pending -> processing -> shipped -> delivered, with cancellation allowed
    /// until shipment. An unpaid pending order can be expired as failed.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Pending, Failed)
                | (Processing, Shipped) | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(self) -> bool { matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus { Pending, Paid, Failed, Refunded }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod { Cod, Online }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderSource { Cart, Hamper }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentGateway { Razorpay, Cashfree }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(regex(path = "PHONE_RE", message = "Phone number must be a valid 10 digit mobile number"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(regex(path = "PINCODE_RE", message = "Pincode must be a valid 6 digit PIN code"))]
    pub pincode: String,
}

impl ShippingAddress {
    /// Trims every field, normalises the phone number and rejects blanks.
    pub fn normalized(mut self) -> Result<Self, OrderError> {
        for field in [&mut self.full_name, &mut self.line1, &mut self.city, &mut self.state, &mut self.pincode] {
            *field = field.trim().to_string();
        }
        self.line2 = self.line2.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        self.phone = Phone::parse(&self.phone).map_err(|e| OrderError::InvalidAddress(e.to_string()))?.as_str().to_string();
        Pincode::parse(&self.pincode).map_err(|e| OrderError::InvalidAddress(e.to_string()))?;
        self.validate().map_err(|e| OrderError::InvalidAddress(first_message(&e)))?;
        Ok(self)
    }
}

fn first_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Shipping address is incomplete".to_string())
}

/// Snapshot of a purchased product, frozen at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub total: Money,
    /// Paid for while out of stock; nothing was reserved for this line.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub backordered: bool,
}

impl OrderLine {
    pub fn new(product_id: Uuid, name: impl Into<String>, image: Option<String>, unit_price: Money, quantity: u32) -> Self {
        Self { product_id, name: name.into(), image, unit_price, quantity, total: unit_price.multiply(quantity), backordered: false }
    }
}

/// What a verified gateway capture did to the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
    /// The order was waiting for this payment and is now confirmed.
    Confirmed,
    /// The order had already been confirmed without payment; only the payment was recorded.
    Recorded,
    /// This capture was seen before.
    Duplicate,
    /// The order was cancelled before the money arrived, which now has to go back.
    RefundDue,
}

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub source: OrderSource,
    pub items: Vec<OrderLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub delivery_charge: Money,
    pub total: Money,
    pub coupon_code: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_gateway: Option<PaymentGateway>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub awb_code: Option<String>,
    pub courier_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Everything checkout has gathered before an order exists.
pub struct PlaceOrder {
    pub user_id: Uuid,
    pub source: OrderSource,
    pub items: Vec<OrderLine>,
    pub quote: CheckoutQuote,
    pub coupon_code: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

impl Order {
    /// Cash-on-delivery orders are confirmed straight away; online orders wait for the gateway.
    pub fn place(cmd: PlaceOrder) -> Result<Self, OrderError> {
        if cmd.items.is_empty() { return Err(OrderError::NoItems); }
        let shipping_address = cmd.shipping_address.normalized()?;
        let now = Utc::now();
        let status = match cmd.payment_method {
            PaymentMethod::Cod => OrderStatus::Processing,
            PaymentMethod::Online => OrderStatus::Pending,
        };
        let mut order = Self {
            id: Uuid::now_v7(), order_number: OrderNumber::generate(now).into_inner(), user_id: cmd.user_id,
            source: cmd.source, items: cmd.items, subtotal: cmd.quote.subtotal, discount: cmd.quote.discount,
            delivery_charge: cmd.quote.delivery_charge, total: cmd.quote.total, coupon_code: cmd.coupon_code,
            shipping_address, payment_method: cmd.payment_method, payment_gateway: None, gateway_order_id: None,
            gateway_payment_id: None, payment_status: PaymentStatus::Pending, status, awb_code: None,
            courier_name: None, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number: order.order_number.clone(), user_id: order.user_id,
            total: order.total.amount(), payment_method: order.payment_method,
        }));
        Ok(order)
    }

    pub fn is_online(&self) -> bool { self.payment_method == PaymentMethod::Online }

    /// Online orders can only be paid while still awaiting the gateway. A failed
    /// attempt leaves the order open for another one.
    pub fn ensure_awaiting_payment(&self) -> Result<(), OrderError> {
        if !self.is_online() { return Err(OrderError::NotPrepaid); }
        if self.payment_status == PaymentStatus::Paid { return Err(OrderError::AlreadyPaid); }
        if self.status != OrderStatus::Pending { return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Processing }); }
        Ok(())
    }

    pub fn attach_gateway(&mut self, gateway: PaymentGateway, gateway_order_id: impl Into<String>) {
        self.payment_gateway = Some(gateway);
        self.gateway_order_id = Some(gateway_order_id.into());
        self.touch();
    }

    /// Applies a verified capture. Money the gateway has taken is always recorded,
    /// whatever state the order reached in the meantime.
    pub fn record_capture(&mut self, gateway_payment_id: Option<String>) -> Capture {
        if matches!(self.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) { return Capture::Duplicate; }
        if gateway_payment_id.is_some() { self.gateway_payment_id = gateway_payment_id; }
        self.touch();
        match self.status {
            OrderStatus::Pending | OrderStatus::Failed => {
                let from = self.status;
                self.payment_status = PaymentStatus::Paid;
                self.status = OrderStatus::Processing;
                self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, total: self.total.amount() }));
                if from == OrderStatus::Failed {
                    self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, user_id: self.user_id, from, to: OrderStatus::Processing }));
                }
                Capture::Confirmed
            }
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {
                self.payment_status = PaymentStatus::Paid;
                self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, total: self.total.amount() }));
                Capture::Recorded
            }
            OrderStatus::Cancelled => {
                self.payment_status = PaymentStatus::Refunded;
                Capture::RefundDue
            }
        }
    }

    /// Records a failed attempt. The order stays pending so the customer can
    /// retry; returns `false` when there was nothing to record.
    pub fn record_failed_attempt(&mut self) -> bool {
        if self.status != OrderStatus::Pending || self.payment_status != PaymentStatus::Pending { return false; }
        self.payment_status = PaymentStatus::Failed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id }));
        true
    }

    /// Flags lines whose stock could not be reserved when the payment landed.
    pub fn mark_backordered(&mut self, product_ids: &[Uuid]) {
        for line in self.items.iter_mut().filter(|l| product_ids.contains(&l.product_id)) {
            line.backordered = true;
        }
        self.touch();
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) { return Err(OrderError::InvalidTransition { from: self.status, to: next }); }
        let from = self.status;
        self.status = next;
        if next == OrderStatus::Delivered && self.payment_method == PaymentMethod::Cod {
            self.payment_status = PaymentStatus::Paid;
        }
        if next == OrderStatus::Cancelled && self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, user_id: self.user_id, from, to: next }));
        Ok(())
    }

    /// Customers may cancel until the parcel ships.
    pub fn cancel_by_customer(&mut self) -> Result<(), OrderError> {
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Processing) { return Err(OrderError::CannotCancel); }
        self.transition(OrderStatus::Cancelled)
    }

    pub fn assign_shipment(&mut self, awb_code: impl Into<String>, courier_name: Option<String>) -> Result<(), OrderError> {
        if self.status.is_terminal() && self.status != OrderStatus::Delivered { return Err(OrderError::CannotShip); }
        self.awb_code = Some(awb_code.into());
        self.courier_name = courier_name;
        self.touch();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Stored order state, as loaded back from the database.
pub struct StoredOrder {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub source: OrderSource,
    pub items: Vec<OrderLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub delivery_charge: Money,
    pub total: Money,
    pub coupon_code: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_gateway: Option<PaymentGateway>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub awb_code: Option<String>,
    pub courier_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredOrder> for Order {
    fn from(s: StoredOrder) -> Self {
        Self {
            id: s.id, order_number: s.order_number, user_id: s.user_id, source: s.source, items: s.items,
            subtotal: s.subtotal, discount: s.discount, delivery_charge: s.delivery_charge, total: s.total,
            coupon_code: s.coupon_code, shipping_address: s.shipping_address, payment_method: s.payment_method,
            payment_gateway: s.payment_gateway, gateway_order_id: s.gateway_order_id, gateway_payment_id: s.gateway_payment_id,
            payment_status: s.payment_status, status: s.status, awb_code: s.awb_code, courier_name: s.courier_name,
            created_at: s.created_at, updated_at: s.updated_at, events: vec![],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Cannot place an order without items")]
    NoItems,
    #[error("{0}")]
    InvalidAddress(String),
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order can no longer be cancelled")]
    CannotCancel,
    #[error("Order cannot be shipped")]
    CannotShip,
    #[error("Order is not paid online")]
    NotPrepaid,
    #[error("Order is already paid")]
    AlreadyPaid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::quote;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".into(), phone: "98450 12345".into(), line1: " 12 MG Road ".into(), line2: Some("  ".into()),
            city: "Bengaluru".into(), state: "Karnataka".into(), pincode: "560001".into(),
        }
    }

    fn place(method: PaymentMethod) -> Order {
        let items = vec![OrderLine::new(Uuid::new_v4(), "Candle", None, Money::rupees(300), 2)];
        Order::place(PlaceOrder {
            user_id: Uuid::new_v4(), source: OrderSource::Cart, items, quote: quote(Money::rupees(600), method, Money::ZERO),
            coupon_code: None, shipping_address: address(), payment_method: method,
        }).unwrap()
    }

    #[test]
    fn test_order_workflow() {
        let mut order = place(PaymentMethod::Online);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Money::rupees(600));
        assert_eq!(order.record_capture(Some("pay_1".into())), Capture::Confirmed);
        assert_eq!(order.record_capture(Some("pay_1".into())), Capture::Duplicate);
        assert_eq!(order.status, OrderStatus::Processing);
        order.transition(OrderStatus::Shipped).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();
        assert!(order.transition(OrderStatus::Cancelled).is_err());
        assert_eq!(order.take_events().len(), 4);
    }

    #[test]
    fn test_cod_is_confirmed_immediately() {
        let mut order = place(PaymentMethod::Cod);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.delivery_charge, Money::rupees(80));
        order.transition(OrderStatus::Shipped).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_transition_graph() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Processing.can_transition_to(Failed));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));
    }

    #[test]
    fn test_customer_cancel_after_shipping_fails() {
        let mut order = place(PaymentMethod::Cod);
        order.transition(OrderStatus::Shipped).unwrap();
        assert_eq!(order.cancel_by_customer(), Err(OrderError::CannotCancel));
    }

    #[test]
    fn test_cancelling_paid_order_marks_refund() {
        let mut order = place(PaymentMethod::Online);
        order.record_capture(None);
        order.cancel_by_customer().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_failed_attempt_keeps_order_open_for_retry() {
        let mut order = place(PaymentMethod::Online);
        assert!(order.record_failed_attempt());
        assert!(!order.record_failed_attempt());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert!(order.ensure_awaiting_payment().is_ok());

        assert_eq!(order.record_capture(Some("pay_retry_ok".into())), Capture::Confirmed);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_retry_ok"));
    }

    #[test]
    fn test_capture_confirms_expired_order() {
        let mut order = place(PaymentMethod::Online);
        order.transition(OrderStatus::Failed).unwrap();
        assert_eq!(order.record_capture(Some("pay_late".into())), Capture::Confirmed);
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[test]
    fn test_capture_after_admin_confirmation_is_recorded() {
        let mut order = place(PaymentMethod::Online);
        order.transition(OrderStatus::Processing).unwrap();
        assert_eq!(order.record_capture(Some("pay_2".into())), Capture::Recorded);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_capture_on_cancelled_order_is_due_for_refund() {
        let mut order = place(PaymentMethod::Online);
        order.cancel_by_customer().unwrap();
        assert_eq!(order.record_capture(Some("pay_3".into())), Capture::RefundDue);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_3"));
        assert_eq!(order.record_capture(Some("pay_3".into())), Capture::Duplicate);
    }

    #[test]
    fn test_backordered_lines_are_flagged() {
        let mut order = place(PaymentMethod::Online);
        let id = order.items[0].product_id;
        order.mark_backordered(&[id]);
        assert!(order.items[0].backordered);
        let json = serde_json::to_value(&order.items[0]).unwrap();
        assert_eq!(json["backordered"], true);
    }

    #[test]
    fn test_address_normalization() {
        let a = address().normalized().unwrap();
        assert_eq!(a.phone, "9845012345");
        assert_eq!(a.line1, "12 MG Road");
        assert_eq!(a.line2, None);

        let blank = ShippingAddress { city: "   ".into(), ..address() };
        assert_eq!(blank.normalized(), Err(OrderError::InvalidAddress("City is required".into())));
        assert!(ShippingAddress { pincode: "12".into(), ..address() }.normalized().is_err());
    }

    #[test]
    fn test_empty_order_rejected() {
        let err = Order::place(PlaceOrder {
            user_id: Uuid::new_v4(), source: OrderSource::Hamper, items: vec![], quote: quote(Money::ZERO, PaymentMethod::Cod, Money::ZERO),
            coupon_code: None, shipping_address: address(), payment_method: PaymentMethod::Cod,
        }).unwrap_err();
        assert_eq!(err, OrderError::NoItems);
    }
}
