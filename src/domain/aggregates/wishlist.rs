//! Wishlist Aggregate

use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct Wishlist {
    product_ids: Vec<Uuid>,
}

impl Wishlist {
    pub fn from_ids(product_ids: Vec<Uuid>) -> Self { Self { product_ids } }

    pub fn product_ids(&self) -> &[Uuid] { &self.product_ids }
    pub fn len(&self) -> usize { self.product_ids.len() }
    pub fn is_empty(&self) -> bool { self.product_ids.is_empty() }
    pub fn contains(&self, product_id: Uuid) -> bool { self.product_ids.contains(&product_id) }

    /// Returns false when the product was already saved.
    pub fn add(&mut self, product_id: Uuid) -> bool {
        if self.contains(product_id) { return false; }
        self.product_ids.push(product_id);
        true
    }

    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.product_ids.len();
        self.product_ids.retain(|id| *id != product_id);
        self.product_ids.len() != before
    }

    /// Returns whether the product is saved afterwards.
    pub fn toggle(&mut self, product_id: Uuid) -> bool {
        if self.remove(product_id) { false } else { self.add(product_id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut w = Wishlist::default();
        let id = Uuid::new_v4();
        assert!(w.add(id));
        assert!(!w.add(id));
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_toggle() {
        let mut w = Wishlist::default();
        let id = Uuid::new_v4();
        assert!(w.toggle(id));
        assert!(w.contains(id));
        assert!(!w.toggle(id));
        assert!(w.is_empty());
    }
}
