use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, CoreResult},
    models::CatalogItem,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub item: CatalogItem,
    pub quantity: i32,
}

/// In-memory selection of items for one customer. The cart is a per-request value
/// owned by the session layer; it never touches storage itself, and its stock check
/// is advisory only — the authoritative check happens inside the checkout
/// transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines in insertion order. Order lines inherit this ordering at checkout.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Adds `quantity` of `item`, consolidating into an existing line if the item is
    /// already present. Fails when the resulting quantity exceeds the item's stock as
    /// of this call.
    pub fn add_item(&mut self, item: CatalogItem, quantity: i32) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(CoreError::Validation(
                "quantity must be greater than 0".to_string(),
            ));
        }

        let requested = match self.lines.iter().find(|l| l.item.id == item.id) {
            Some(line) => line.quantity + quantity,
            None => quantity,
        };
        if requested > item.stock {
            return Err(CoreError::InsufficientStock { item_id: item.id });
        }

        match self.lines.iter_mut().find(|l| l.item.id == item.id) {
            Some(line) => {
                // Keep the freshest item snapshot so subtotal uses the current price.
                line.item = item;
                line.quantity = requested;
            }
            None => self.lines.push(CartLine { item, quantity }),
        }

        Ok(())
    }

    /// Removes the line for `item_id` if present; silently does nothing otherwise.
    pub fn remove_item(&mut self, item_id: i64) {
        self.lines.retain(|l| l.item.id != item_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of unit price times quantity across all lines, at current prices.
    pub fn subtotal(&self) -> i64 {
        self.lines
            .iter()
            .map(|l| l.item.price * l.quantity as i64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogItem;
    use chrono::Utc;

    fn item(id: i64, price: i64, stock: i32) -> CatalogItem {
        CatalogItem {
            id,
            name: format!("item-{id}"),
            description: None,
            price,
            stock,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn add_consolidates_quantity_for_same_item() {
        let mut cart = Cart::new();
        cart.add_item(item(1, 1000, 10), 2).unwrap();
        cart.add_item(item(1, 1000, 10), 3).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn add_preserves_insertion_order() {
        let mut cart = Cart::new();
        cart.add_item(item(2, 500, 5), 1).unwrap();
        cart.add_item(item(1, 1000, 10), 1).unwrap();
        cart.add_item(item(2, 500, 5), 1).unwrap();

        let ids: Vec<i64> = cart.lines().iter().map(|l| l.item.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn add_rejects_quantity_beyond_stock() {
        let mut cart = Cart::new();
        let err = cart.add_item(item(1, 1000, 3), 4).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { item_id: 1 }));
        assert!(cart.is_empty());
    }

    #[test]
    fn consolidated_quantity_is_checked_against_stock() {
        let mut cart = Cart::new();
        cart.add_item(item(1, 1000, 3), 2).unwrap();
        let err = cart.add_item(item(1, 1000, 3), 2).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { item_id: 1 }));
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add_item(item(1, 1000, 10), 0),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn remove_is_a_no_op_for_missing_item() {
        let mut cart = Cart::new();
        cart.add_item(item(1, 1000, 10), 1).unwrap();
        cart.remove_item(99);
        assert_eq!(cart.len(), 1);

        cart.remove_item(1);
        assert!(cart.is_empty());
    }

    #[test]
    fn subtotal_uses_current_prices() {
        let mut cart = Cart::new();
        cart.add_item(item(1, 1000, 10), 2).unwrap();
        cart.add_item(item(2, 500, 5), 1).unwrap();
        assert_eq!(cart.subtotal(), 2500);

        // Re-adding with a fresher snapshot repricing the item updates the subtotal.
        cart.add_item(item(1, 1200, 10), 1).unwrap();
        assert_eq!(cart.subtotal(), 1200 * 3 + 500);
    }
}
