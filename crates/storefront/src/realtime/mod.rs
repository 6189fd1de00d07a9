//! Realtime keyed database.
//!
//! A JSON tree addressed by slash-separated paths, with live subscriptions:
//! [`RealtimeDatabase::watch`] yields the value at a path immediately and then
//! again, in full, after every change below it.
//!
//! # Backends
//!
//! - [`MemoryDatabase`] - in-process tree, for tests and offline use
//! - [`RestDatabase`] - Firebase Realtime Database REST API with SSE streaming

mod memory;
mod rest;
mod sse;
mod tree;

pub use memory::MemoryDatabase;
pub use rest::RestDatabase;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::RealtimeConfig;

/// Errors raised by a realtime database backend.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The database answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credentials were rejected or revoked.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The live stream broke or was cancelled by the server.
    #[error("stream error: {0}")]
    Stream(String),

    /// The path contains characters the database does not allow.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The backend is not accepting requests.
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

/// Stream of full values at a watched path.
pub type SnapshotStream = BoxStream<'static, Result<Value, DatabaseError>>;

/// Remote JSON tree with live subscriptions.
///
/// Writes complete when the database acknowledges them; observers learn about
/// them only through [`watch`](Self::watch).
#[async_trait]
pub trait RealtimeDatabase: Send + Sync {
    /// Append `value` under a newly generated child key of `path`.
    ///
    /// Returns the generated key.
    async fn push(&self, path: &str, value: Value) -> Result<String, DatabaseError>;

    /// Replace the value at `path`. Writing `null` removes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), DatabaseError>;

    /// Delete the value at `path` and everything below it.
    async fn remove(&self, path: &str) -> Result<(), DatabaseError>;

    /// Read the value at `path` once. Missing paths read as `null`.
    async fn get(&self, path: &str) -> Result<Value, DatabaseError>;

    /// Subscribe to the value at `path`.
    ///
    /// The stream yields the current value first, then the full value after
    /// each change. Dropping the stream detaches the listener.
    async fn watch(&self, path: &str) -> Result<SnapshotStream, DatabaseError>;
}

/// Open the configured backend, or an in-process one when none is configured.
///
/// # Errors
///
/// Returns an error if the REST client cannot be built.
pub fn connect(config: Option<&RealtimeConfig>) -> Result<Arc<dyn RealtimeDatabase>, DatabaseError> {
    match config {
        Some(config) => {
            info!(url = %config.url, "Using remote realtime database");
            Ok(Arc::new(RestDatabase::new(
                config.url.clone(),
                config.auth.clone(),
            )?))
        }
        None => {
            warn!("BISTRO_REALTIME_URL not set, messages are kept in memory only");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}
