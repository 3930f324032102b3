//! Custom hamper builder

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::product::{Product, ProductError};
use crate::domain::value_objects::Money;

/// A hamper box holds at most this many items in total.
pub const MAX_HAMPER_ITEMS: u32 = 20;

#[derive(Clone, Debug)]
pub struct Hamper {
    user_id: Uuid,
    items: Vec<HamperItem>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HamperItem {
    pub product: Product,
    pub quantity: u32,
}

impl HamperItem {
    pub fn unit_price(&self) -> Money { self.product.hamper_unit_price() }
    pub fn line_total(&self) -> Money { self.unit_price().multiply(self.quantity) }
}

impl Hamper {
    pub fn new(user_id: Uuid) -> Self { Self { user_id, items: vec![] } }
    pub fn from_items(user_id: Uuid, items: Vec<HamperItem>) -> Self { Self { user_id, items } }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[HamperItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total_items(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn total_price(&self) -> Money { self.items.iter().fold(Money::ZERO, |acc, i| acc.add(i.line_total())) }

    pub fn quantity_of(&self, product_id: Uuid) -> Option<u32> {
        self.items.iter().find(|i| i.product.id == product_id).map(|i| i.quantity)
    }

    /// Returns the new quantity of the product's line.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<u32, HamperError> {
        if quantity == 0 { return Err(HamperError::InvalidQuantity); }
        product.ensure_hamper_eligible()?;
        if quantity > MAX_HAMPER_ITEMS || self.total_items().saturating_add(quantity) > MAX_HAMPER_ITEMS { return Err(HamperError::Full); }
        let wanted = self.quantity_of(product.id).unwrap_or(0).saturating_add(quantity);
        product.ensure_purchasable(wanted)?;
        match self.items.iter_mut().find(|i| i.product.id == product.id) {
            Some(existing) => { existing.product = product; existing.quantity = wanted; }
            None => self.items.push(HamperItem { product, quantity: wanted }),
        }
        Ok(wanted)
    }

    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), HamperError> {
        if quantity == 0 { return self.remove_item(product_id); }
        let others = self.items.iter().filter(|i| i.product.id != product_id).map(|i| i.quantity).sum::<u32>();
        let item = self.items.iter_mut().find(|i| i.product.id == product_id).ok_or(HamperError::ItemNotFound)?;
        if others.saturating_add(quantity) > MAX_HAMPER_ITEMS { return Err(HamperError::Full); }
        item.product.ensure_purchasable(quantity)?;
        item.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), HamperError> {
        let before = self.items.len();
        self.items.retain(|i| i.product.id != product_id);
        if self.items.len() == before { return Err(HamperError::ItemNotFound); }
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HamperError {
    #[error("Item not found in hamper")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("A hamper can hold at most {} items", MAX_HAMPER_ITEMS)]
    Full,
    #[error(transparent)]
    Product(#[from] ProductError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::product;

    fn eligible(price: i64, hamper_price: Option<i64>) -> Product {
        Product { is_hamper_eligible: true, hamper_price: hamper_price.map(Money::rupees), ..product(price, 100) }
    }

    #[test]
    fn test_add_increases_total_items_by_quantity() {
        let mut hamper = Hamper::new(Uuid::new_v4());
        let p = eligible(200, Some(150));
        hamper.add_item(p.clone(), 2).unwrap();
        assert_eq!(hamper.total_items(), 2);
        hamper.add_item(p, 3).unwrap();
        assert_eq!(hamper.total_items(), 5);
        assert_eq!(hamper.total_price(), Money::rupees(750));
    }

    #[test]
    fn test_rejects_ineligible_product() {
        let mut hamper = Hamper::new(Uuid::new_v4());
        let err = hamper.add_item(product(100, 10), 1).unwrap_err();
        assert_eq!(err, HamperError::Product(ProductError::NotHamperEligible));
    }

    #[test]
    fn test_capacity() {
        let mut hamper = Hamper::new(Uuid::new_v4());
        let a = eligible(50, None);
        hamper.add_item(a.clone(), MAX_HAMPER_ITEMS).unwrap();
        assert_eq!(hamper.add_item(eligible(10, None), 1), Err(HamperError::Full));
        assert_eq!(hamper.update_quantity(a.id, MAX_HAMPER_ITEMS + 1), Err(HamperError::Full));
        hamper.update_quantity(a.id, 4).unwrap();
        assert_eq!(hamper.total_price(), Money::rupees(200));
    }

    #[test]
    fn test_huge_quantity_is_rejected_without_overflow() {
        let mut hamper = Hamper::new(Uuid::new_v4());
        let a = eligible(50, None);
        hamper.add_item(a.clone(), 1).unwrap();
        assert_eq!(hamper.add_item(a.clone(), u32::MAX), Err(HamperError::Full));
        assert_eq!(hamper.update_quantity(a.id, u32::MAX), Err(HamperError::Full));
        assert_eq!(hamper.quantity_of(a.id), Some(1));
        assert_eq!(hamper.total_items(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut hamper = Hamper::new(Uuid::new_v4());
        let a = eligible(50, None);
        hamper.add_item(a.clone(), 1).unwrap();
        hamper.add_item(eligible(60, None), 1).unwrap();
        hamper.remove_item(a.id).unwrap();
        assert_eq!(hamper.items().len(), 1);
        hamper.clear();
        assert!(hamper.is_empty());
    }
}
