//! Pre-order cart.
//!
//! The cart collects menu items before checkout. Adding an item that is
//! already in the cart bumps its quantity instead of adding a second line, and
//! setting a quantity to zero removes the line.

use std::num::NonZeroU32;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::MenuItemId;
use super::menu::MenuItem;
use super::order::{Customer, NewPreOrder, OrderItem};
use super::price::Price;

/// Errors from cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Checkout was attempted with nothing in the cart.
    #[error("cart is empty")]
    Empty,
    /// The referenced menu item is not in the cart.
    #[error("menu item {0} is not in the cart")]
    NotInCart(MenuItemId),
}

/// Items a customer intends to pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<OrderItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add one unit of `menu_item`.
    pub fn add(&mut self, menu_item: MenuItem) {
        self.add_quantity(menu_item, 1);
    }

    /// Add `quantity` units of `menu_item`. Adding zero is a no-op.
    pub fn add_quantity(&mut self, menu_item: MenuItem, quantity: u32) {
        let Some(quantity) = NonZeroU32::new(quantity) else {
            return;
        };
        if let Some(line) = self.line_mut(menu_item.id) {
            line.quantity = line.quantity.saturating_add(quantity.get());
        } else {
            self.items.push(OrderItem {
                menu_item,
                quantity,
                special_instructions: None,
            });
        }
    }

    /// Set the quantity of an item already in the cart; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the item has no line in the cart.
    pub fn update_quantity(&mut self, item_id: MenuItemId, quantity: u32) -> Result<(), CartError> {
        let Some(quantity) = NonZeroU32::new(quantity) else {
            let before = self.items.len();
            self.items.retain(|line| line.menu_item.id != item_id);
            if self.items.len() == before {
                return Err(CartError::NotInCart(item_id));
            }
            return Ok(());
        };

        let line = self.line_mut(item_id).ok_or(CartError::NotInCart(item_id))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Attach kitchen instructions to one line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the item has no line in the cart.
    pub fn set_instructions(
        &mut self,
        item_id: MenuItemId,
        instructions: Option<String>,
    ) -> Result<(), CartError> {
        let line = self.line_mut(item_id).ok_or(CartError::NotInCart(item_id))?;
        line.special_instructions = instructions.filter(|s| !s.trim().is_empty());
        Ok(())
    }

    /// Lines currently in the cart, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Running total at current embedded prices.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// Turn the cart into an order submission.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Empty` if there is nothing to order.
    pub fn checkout(
        self,
        customer: Customer,
        pickup_date: NaiveDate,
        pickup_time: NaiveTime,
        special_instructions: Option<String>,
    ) -> Result<NewPreOrder, CartError> {
        if self.items.is_empty() {
            return Err(CartError::Empty);
        }
        Ok(NewPreOrder {
            items: self.items,
            customer,
            pickup_date,
            pickup_time,
            special_instructions: special_instructions.filter(|s| !s.trim().is_empty()),
        })
    }

    fn line_mut(&mut self, item_id: MenuItemId) -> Option<&mut OrderItem> {
        self.items
            .iter_mut()
            .find(|line| line.menu_item.id == item_id)
    }
}
