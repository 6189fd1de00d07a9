//! Pre-order state.
//!
//! [`OrderStore`] owns the customer's pre-orders for one client context. Every
//! mutation rewrites the persisted collection and then hands each subscriber
//! its own copy of the full list.

mod store;
mod subscribers;

pub use store::{OrderStore, OrderStoreError, OrderSubscription, STORAGE_KEY};
