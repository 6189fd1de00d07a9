//! Core types for Bistro.
//!
//! This module provides type-safe wrappers for the restaurant's domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod menu;
pub mod message;
pub mod order;
pub mod price;
pub mod status;

pub use cart::{Cart, CartError};
pub use email::{Email, EmailError};
pub use id::*;
pub use menu::MenuItem;
pub use message::{ContactMessage, MessageEntry, NewContactMessage};
pub use order::{Customer, NewPreOrder, OrderItem, PreOrder};
pub use price::Price;
pub use status::*;
