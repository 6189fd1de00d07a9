//! Unified error handling with Sentry integration.
//!
//! [`StorefrontError`] wraps every layer's error so front ends (the CLI) can
//! report failures uniformly through [`capture`].

use bistro_core::CartError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::menu::MenuError;
use crate::messages::MessageStoreError;
use crate::orders::OrderStoreError;
use crate::realtime::DatabaseError;
use crate::storage::StorageError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Menu could not be loaded.
    #[error("Menu error: {0}")]
    Menu(#[from] MenuError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Order store operation failed.
    #[error("Order error: {0}")]
    Orders(#[from] OrderStoreError),

    /// Realtime database could not be reached or configured.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Message store operation failed.
    #[error("Message error: {0}")]
    Messages(#[from] MessageStoreError),

    /// The cart cannot be checked out or edited as asked.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Writing command output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl StorefrontError {
    /// Whether this error points at a broken dependency rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        !matches!(
            self,
            Self::NotFound(_) | Self::BadRequest(_) | Self::Cart(_)
        )
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Log an error, sending internal failures to Sentry.
pub fn capture(err: &StorefrontError) {
    if err.is_internal() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            sentry_event_id = %event_id,
            "Command failed"
        );
    } else {
        tracing::error!(error = %err, "Command failed");
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("orders", "Created order", Some(&[("order_id", "1760000000000")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
