//! Cart Aggregate

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::product::{Product, ProductError};
use crate::domain::value_objects::Money;

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 10;

#[derive(Clone, Debug)]
pub struct Cart {
    user_id: Uuid,
    lines: Vec<CartLine>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.product.price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self { Self { user_id, lines: vec![] } }

    pub fn from_lines(user_id: Uuid, lines: Vec<CartLine>) -> Self { Self { user_id, lines } }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn total_items(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }
    pub fn subtotal(&self) -> Money { self.lines.iter().fold(Money::ZERO, |acc, l| acc.add(l.line_total())) }

    pub fn quantity_of(&self, product_id: Uuid) -> Option<u32> {
        self.lines.iter().find(|l| l.product.id == product_id).map(|l| l.quantity)
    }

    /// Adds to an existing line or opens a new one. Returns the resulting line quantity.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<u32, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let current = self.quantity_of(product.id).unwrap_or(0);
        let wanted = current.saturating_add(quantity).min(MAX_LINE_QUANTITY);
        product.ensure_purchasable(wanted)?;
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(existing) => { existing.product = product; existing.quantity = wanted; }
            None => self.lines.push(CartLine { product, quantity: wanted }),
        }
        Ok(wanted)
    }

    /// Sets the line quantity; zero removes the line.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return self.remove_item(product_id); }
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
        let line = self.lines.iter_mut().find(|l| l.product.id == product_id).ok_or(CartError::ItemNotFound)?;
        line.product.ensure_purchasable(quantity)?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product.id != product_id);
        if self.lines.len() == before { return Err(CartError::ItemNotFound); }
        Ok(())
    }

    /// Folds a client-held cart into this one. Lines present on both sides keep the
    /// larger quantity so replaying the same local cart is harmless. Incoming lines
    /// are capped by the remaining stock; inactive or sold out products are
    /// skipped and returned.
    pub fn merge(&mut self, incoming: Vec<(Product, u32)>) -> Vec<Uuid> {
        let mut skipped = vec![];
        for (product, quantity) in incoming {
            if quantity == 0 { continue; }
            let available = product.available();
            if available == 0 { skipped.push(product.id); continue; }
            let quantity = quantity.min(MAX_LINE_QUANTITY).min(available);
            let current = self.quantity_of(product.id).unwrap_or(0);
            if quantity <= current { continue; }
            match self.lines.iter_mut().find(|l| l.product.id == product.id) {
                Some(existing) => { existing.product = product; existing.quantity = quantity; }
                None => self.lines.push(CartLine { product, quantity }),
            }
        }
        skipped
    }

    pub fn clear(&mut self) { self.lines.clear(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Quantity must be between 1 and {}", MAX_LINE_QUANTITY)]
    InvalidQuantity,
    #[error(transparent)]
    Product(#[from] ProductError),
}
