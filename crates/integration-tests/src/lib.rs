//! Integration tests for Bistro.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bistro-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `orders` - order store lifecycle, persistence and subscribers
//! - `messages` - message store against the in-process realtime database
//!
//! Shared fixtures live here.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use bistro_core::{
    Cart, ContactMessage, Customer, Email, MenuItem, NewContactMessage, NewPreOrder, Price,
};
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::mpsc::UnboundedReceiver;

/// How long to wait for a pushed snapshot before failing.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

/// Menu item A: $10.00.
#[must_use]
pub fn item_a() -> MenuItem {
    MenuItem::new(1, "Braised Short Rib", Price::from_cents(1000))
}

/// Menu item B: $5.00.
#[must_use]
pub fn item_b() -> MenuItem {
    MenuItem::new(2, "Garlic Bread", Price::from_cents(500))
}

/// A customer with a valid email.
///
/// # Panics
///
/// Never; the address is a valid literal.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn customer() -> Customer {
    Customer {
        name: "Ada Lovelace".to_string(),
        email: Email::parse("ada@example.com").unwrap(),
        phone: "555-0100".to_string(),
    }
}

/// An order for `quantity` of each given item, picked up 2026-10-20 18:30.
///
/// # Panics
///
/// Panics if `items` is empty.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn order_of(items: &[(MenuItem, u32)]) -> NewPreOrder {
    let mut cart = Cart::new();
    for (item, quantity) in items {
        cart.add_quantity(item.clone(), *quantity);
    }
    cart.checkout(
        customer(),
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
        None,
    )
    .unwrap()
}

/// A contact form submission with the given subject.
///
/// # Panics
///
/// Never; the address is a valid literal.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn contact(subject: &str) -> NewContactMessage {
    NewContactMessage {
        name: "Grace Hopper".to_string(),
        email: Email::parse("grace@example.com").unwrap(),
        subject: subject.to_string(),
        message: "Could we book the back room?".to_string(),
    }
}

/// Wait for the next message snapshot.
///
/// # Panics
///
/// Panics if no snapshot arrives within [`SNAPSHOT_TIMEOUT`] or the
/// subscription has ended.
#[allow(clippy::expect_used)]
pub async fn next_snapshot(rx: &mut UnboundedReceiver<Vec<ContactMessage>>) -> Vec<ContactMessage> {
    tokio::time::timeout(SNAPSHOT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for snapshot")
        .expect("subscription ended")
}

/// Wait until a snapshot satisfies `done`, returning it.
///
/// Backends may coalesce bursts of writes, so tests that race several writes
/// wait for the state they expect rather than counting snapshots.
///
/// # Panics
///
/// Same as [`next_snapshot`].
pub async fn snapshot_where<F>(
    rx: &mut UnboundedReceiver<Vec<ContactMessage>>,
    done: F,
) -> Vec<ContactMessage>
where
    F: Fn(&[ContactMessage]) -> bool,
{
    loop {
        let snapshot = next_snapshot(rx).await;
        if done(&snapshot) {
            return snapshot;
        }
    }
}
