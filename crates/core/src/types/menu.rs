//! Menu entry as published by the menu collaborator.

use serde::{Deserialize, Serialize};

use super::id::MenuItemId;
use super::price::Price;

/// A dish on the menu.
///
/// Order items embed a copy of this record, so a later price change on the
/// menu never alters an order that was already placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub description: String,
    /// Image URL or static asset path.
    #[serde(default)]
    pub image: String,
}

impl MenuItem {
    /// Create a menu item without description or image.
    #[must_use]
    pub fn new(id: impl Into<MenuItemId>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            description: String::new(),
            image: String::new(),
        }
    }
}
