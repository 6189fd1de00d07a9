//! Read-only menu loaded from a JSON file.

use std::collections::HashSet;
use std::path::Path;

use bistro_core::{MenuItem, MenuItemId};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors loading a menu.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("failed to read menu: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse menu: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate menu item id {0}")]
    DuplicateId(MenuItemId),
}

/// The dishes on offer, in display order.
#[derive(Debug, Clone, Default)]
pub struct Menu {
    items: Vec<MenuItem>,
}

impl Menu {
    /// Build a menu from items.
    ///
    /// # Errors
    ///
    /// Returns `MenuError::DuplicateId` if two items share an id.
    pub fn new(items: Vec<MenuItem>) -> Result<Self, MenuError> {
        let mut seen = HashSet::new();
        if let Some(dup) = items.iter().find(|item| !seen.insert(item.id)) {
            return Err(MenuError::DuplicateId(dup.id));
        }
        Ok(Self { items })
    }

    /// Load a menu from a JSON array of items.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or contains
    /// duplicate ids.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MenuError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let menu = Self::from_json(&raw)?;
        debug!(items = menu.items.len(), "Menu loaded");
        Ok(menu)
    }

    /// Parse a menu from a JSON array of items.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or contains duplicate ids.
    pub fn from_json(raw: &str) -> Result<Self, MenuError> {
        Self::new(serde_json::from_str(raw)?)
    }

    /// Look up an item by id.
    #[must_use]
    pub fn find(&self, id: MenuItemId) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }
}
