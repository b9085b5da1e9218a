use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    cart::Cart,
    error::{CoreError, CoreResult},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One item/quantity entry within an order. The unit price is captured at purchase
/// time and never re-read from the catalog, so historical orders stay immutable when
/// catalog prices change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: i64,
    pub quantity: i32,
    pub unit_price: i64,
}

/// Immutable snapshot of a cart and a customer at the moment of checkout. The
/// identity stays unset until the repository persists the header; it can be assigned
/// exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: Option<i64>,
    pub customer_id: i64,
    pub reference: String,
    pub total_amount: i64,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Builds the order snapshot from a cart. Captures the subtotal and each line's
    /// current unit price; the shipping address falls back to the customer's.
    pub fn create(
        customer: &Customer,
        cart: &Cart,
        shipping_address: Option<String>,
    ) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        let lines = cart
            .lines()
            .iter()
            .map(|l| OrderLine {
                item_id: l.item.id,
                quantity: l.quantity,
                unit_price: l.item.price,
            })
            .collect();

        Ok(Self {
            id: None,
            customer_id: customer.id,
            reference: build_reference(),
            total_amount: cart.subtotal(),
            shipping_address: shipping_address.unwrap_or_else(|| customer.address.clone()),
            created_at: Utc::now(),
            lines,
        })
    }

    /// Reconstructs a persisted order purely from row data. Read paths only; nothing
    /// is re-validated or recomputed.
    pub fn from_snapshot(
        id: i64,
        customer_id: i64,
        reference: String,
        total_amount: i64,
        shipping_address: String,
        created_at: DateTime<Utc>,
        lines: Vec<OrderLine>,
    ) -> Self {
        Self {
            id: Some(id),
            customer_id,
            reference,
            total_amount,
            shipping_address,
            created_at,
            lines,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Assigns the repository-generated identity. A second assignment fails.
    pub fn assign_id(&mut self, id: i64) -> CoreResult<()> {
        if self.id.is_some() {
            return Err(CoreError::IdentityAlreadySet);
        }
        self.id = Some(id);
        Ok(())
    }
}

fn build_reference() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = Uuid::new_v4().to_string();
    let short = &suffix[..8];
    format!("ORD-{}-{}", date, short)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "available" => Ok(SlotStatus::Available),
            "booked" => Ok(SlotStatus::Booked),
            other => Err(CoreError::Validation(format!(
                "unknown slot status: {other}"
            ))),
        }
    }
}

/// A bookable unit of schedule. The status only ever moves Available -> Booked; the
/// authoritative transition happens in storage, and `book` is the in-memory guard
/// applied once that transition has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: i64,
    pub starts_at: DateTime<Utc>,
    pub status: SlotStatus,
}

impl TimeSlot {
    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    pub fn book(&mut self) -> CoreResult<()> {
        if self.status != SlotStatus::Available {
            return Err(CoreError::InvalidTransition);
        }
        self.status = SlotStatus::Booked;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub customer_id: i64,
    pub time_slot_id: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Cart;

    fn customer() -> Customer {
        Customer {
            id: 7,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            address: "1 Analytical Way".into(),
            created_at: Utc::now(),
        }
    }

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
    fn create_fails_on_empty_cart() {
        let cart = Cart::new();
        assert!(matches!(
            Order::create(&customer(), &cart, None),
            Err(CoreError::EmptyCart)
        ));
    }

    #[test]
    fn create_captures_prices_and_total() {
        let mut cart = Cart::new();
        cart.add_item(item(1, 1000, 10), 2).unwrap();
        cart.add_item(item(2, 500, 5), 1).unwrap();

        let order = Order::create(&customer(), &cart, None).unwrap();
        assert_eq!(order.total_amount, 2500);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].unit_price, 1000);
        assert_eq!(order.lines[1].unit_price, 500);
        assert!(order.id().is_none());
        assert!(order.reference.starts_with("ORD-"));
    }

    #[test]
    fn shipping_address_defaults_to_customer_address() {
        let mut cart = Cart::new();
        cart.add_item(item(1, 1000, 10), 1).unwrap();

        let order = Order::create(&customer(), &cart, None).unwrap();
        assert_eq!(order.shipping_address, "1 Analytical Way");

        let order = Order::create(&customer(), &cart, Some("Elsewhere 2".into())).unwrap();
        assert_eq!(order.shipping_address, "Elsewhere 2");
    }

    #[test]
    fn identity_is_assigned_exactly_once() {
        let mut cart = Cart::new();
        cart.add_item(item(1, 1000, 10), 1).unwrap();

        let mut order = Order::create(&customer(), &cart, None).unwrap();
        order.assign_id(42).unwrap();
        assert_eq!(order.id(), Some(42));
        assert!(matches!(
            order.assign_id(43),
            Err(CoreError::IdentityAlreadySet)
        ));
        assert_eq!(order.id(), Some(42));
    }

    #[test]
    fn from_snapshot_keeps_row_data_verbatim() {
        let lines = vec![OrderLine {
            item_id: 1,
            quantity: 2,
            unit_price: 999,
        }];
        // Total deliberately disagrees with the lines: snapshots are never recomputed.
        let order = Order::from_snapshot(
            5,
            7,
            "ORD-20260101-abcd1234".into(),
            123,
            "Somewhere".into(),
            Utc::now(),
            lines,
        );
        assert_eq!(order.id(), Some(5));
        assert_eq!(order.total_amount, 123);
    }

    #[test]
    fn slot_books_only_from_available() {
        let mut slot = TimeSlot {
            id: 1,
            starts_at: Utc::now(),
            status: SlotStatus::Available,
        };
        assert!(slot.is_available());
        slot.book().unwrap();
        assert_eq!(slot.status, SlotStatus::Booked);
        assert!(matches!(slot.book(), Err(CoreError::InvalidTransition)));
    }

    #[test]
    fn slot_status_round_trips_through_strings() {
        assert_eq!(SlotStatus::parse("available").unwrap(), SlotStatus::Available);
        assert_eq!(SlotStatus::parse("booked").unwrap(), SlotStatus::Booked);
        assert!(SlotStatus::parse("cancelled").is_err());
    }
}
