//! Contact message state.
//!
//! [`MessageStore`] keeps no copy of the messages. The realtime database is
//! the single source of truth: writes go straight to it, and subscribers
//! rebuild their view from each full snapshot it pushes.

mod store;

pub use store::{COLLECTION, MessageStore, MessageStoreError, MessageSubscription};
