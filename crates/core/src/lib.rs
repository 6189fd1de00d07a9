//! Bistro Core - Restaurant domain types.
//!
//! This crate provides the types shared by every Bistro component:
//! - `storefront` - Order and contact-message state stores
//! - `cli` - Command-line driver for customers and staff
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage,
//! no HTTP clients. Stores in `bistro-storefront` decide when things happen;
//! the types here decide what a valid order or message looks like.
//!
//! # Modules
//!
//! - [`types`] - Ids, prices, emails, statuses, menu items, carts, pre-orders
//!   and contact messages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
