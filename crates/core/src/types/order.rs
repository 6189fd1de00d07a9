//! Pre-order domain types.
//!
//! A [`NewPreOrder`] is what a customer submits; the order store turns it into
//! a [`PreOrder`] by assigning the id, the initial status and the timestamps.
//! The stored representation uses camelCase keys.

use std::num::NonZeroU32;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::OrderId;
use super::menu::MenuItem;
use super::price::Price;
use super::status::OrderStatus;

/// One line of an order: a menu item and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_item: MenuItem,
    /// Carts drop lines whose quantity reaches zero; stored data with a
    /// zero quantity does not decode.
    pub quantity: NonZeroU32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl OrderItem {
    /// Price of this line at the menu item's current (embedded) price.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.menu_item.price.times(self.quantity.get())
    }
}

/// Who placed the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: Email,
    pub phone: String,
}

/// Order fields supplied by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPreOrder {
    pub items: Vec<OrderItem>,
    pub customer: Customer,
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl NewPreOrder {
    /// Sum of price times quantity over all items.
    #[must_use]
    pub fn total_amount(&self) -> Price {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// A placed pre-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreOrder {
    pub id: OrderId,
    pub items: Vec<OrderItem>,
    pub customer: Customer,
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub status: OrderStatus,
    /// Frozen at creation time.
    pub total_amount: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PreOrder {
    /// Build a pending order from customer input.
    ///
    /// The total is computed here, once, from the embedded item prices.
    #[must_use]
    pub fn place(id: OrderId, input: NewPreOrder, now: DateTime<Utc>) -> Self {
        let total_amount = input.total_amount();
        Self {
            id,
            items: input.items,
            customer: input.customer,
            pickup_date: input.pickup_date,
            pickup_time: input.pickup_time,
            status: OrderStatus::Pending,
            total_amount,
            special_instructions: input.special_instructions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the order to `status`, stamping `updated_at`.
    ///
    /// `updated_at` never goes below `created_at`, even if the clock stepped
    /// backwards between the two writes.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now.max(self.created_at);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn new_order() -> NewPreOrder {
        NewPreOrder {
            items: vec![
                OrderItem {
                    menu_item: MenuItem::new(1, "Risotto", Price::from_cents(1000)),
                    quantity: NonZeroU32::new(2).unwrap(),
                    special_instructions: None,
                },
                OrderItem {
                    menu_item: MenuItem::new(2, "Bruschetta", Price::from_cents(500)),
                    quantity: NonZeroU32::MIN,
                    special_instructions: Some("no garlic".to_string()),
                },
            ],
            customer: Customer {
                name: "Ada".to_string(),
                email: Email::parse("ada@example.com").unwrap(),
                phone: "555-0100".to_string(),
            },
            pickup_date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            pickup_time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            special_instructions: None,
        }
    }

    #[test]
    fn test_place_computes_total_and_pending() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let order = PreOrder::place(OrderId::new("1"), new_order(), now);
        assert_eq!(order.total_amount, Price::from_cents(2500));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, now);
        assert_eq!(order.updated_at, now);
    }

    #[test]
    fn test_set_status_never_precedes_creation() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let mut order = PreOrder::place(OrderId::new("1"), new_order(), now);

        order.set_status(OrderStatus::Ready, now - Duration::seconds(5));
        assert_eq!(order.status, OrderStatus::Ready);
        assert_eq!(order.updated_at, now);

        order.set_status(OrderStatus::Completed, now + Duration::minutes(3));
        assert_eq!(order.updated_at, now + Duration::minutes(3));
    }

    #[test]
    fn test_stored_shape_uses_camel_case() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let order = PreOrder::place(OrderId::new("42"), new_order(), now);
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(value["id"], "42");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["totalAmount"], "25.00");
        assert_eq!(value["pickupDate"], "2026-10-17");
        assert_eq!(value["items"][0]["menuItem"]["name"], "Risotto");
        assert!(value["createdAt"].is_string());
        assert_eq!(value["items"][0]["quantity"], 2);
    }

    #[test]
    fn test_zero_quantity_does_not_decode() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let mut value =
            serde_json::to_value(PreOrder::place(OrderId::new("42"), new_order(), now)).unwrap();
        value["items"][1]["quantity"] = serde_json::json!(0);

        assert!(serde_json::from_value::<PreOrder>(value).is_err());
    }
}
