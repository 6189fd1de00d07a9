//! Message store: thin synchronization layer over the realtime database.

use std::sync::Arc;

use bistro_core::{ContactMessage, MessageEntry, MessageId, MessageStatus, NewContactMessage};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::realtime::{DatabaseError, RealtimeDatabase};

/// Database location holding all contact messages.
pub const COLLECTION: &str = "contact-messages";

/// Errors from message store operations.
#[derive(Debug, Error)]
pub enum MessageStoreError {
    /// The realtime database rejected or failed the operation.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The message could not be encoded for storage.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The id cannot address a single message.
    #[error("invalid message id: {0:?}")]
    InvalidId(String),
}

/// Contact messages backed by a realtime database.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct MessageStore {
    db: Arc<dyn RealtimeDatabase>,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore").finish_non_exhaustive()
    }
}

impl MessageStore {
    /// Create a store over `db`.
    #[must_use]
    pub fn new(db: Arc<dyn RealtimeDatabase>) -> Self {
        Self { db }
    }

    /// Store a contact form submission.
    ///
    /// The message is stamped unread at the current time and appended to the
    /// collection; the database assigns the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. Nothing is retried.
    #[instrument(skip(self, input), fields(email = %input.email, subject = %input.subject))]
    pub async fn store_contact_message(
        &self,
        input: NewContactMessage,
    ) -> Result<ContactMessage, MessageStoreError> {
        let entry = input.into_entry(Utc::now());
        let value = serde_json::to_value(&entry)?;
        let key = self.db.push(COLLECTION, value).await?;

        info!(message_id = %key, "Contact message stored");
        Ok(ContactMessage::from_entry(MessageId::new(key), entry))
    }

    /// Live, newest-first view of all messages.
    ///
    /// Yields the current list first and the full list again after every
    /// change made by any client. Stream errors are logged and skipped.
    /// Dropping the stream detaches the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    pub async fn contact_messages(
        &self,
    ) -> Result<impl Stream<Item = Vec<ContactMessage>> + Send + 'static, MessageStoreError> {
        let snapshots = self.db.watch(COLLECTION).await?;
        Ok(snapshots.filter_map(|snapshot| async move {
            match snapshot {
                Ok(value) => Some(messages_from_snapshot(value)),
                Err(e) => {
                    warn!(error = %e, "Contact message subscription error");
                    None
                }
            }
        }))
    }

    /// Call `callback` with the newest-first list of messages now and after
    /// every remote change, until the returned handle is dropped or
    /// unsubscribed.
    ///
    /// Must be called from within a Tokio runtime; the listener runs as a
    /// spawned task.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    pub async fn subscribe_to_contact_messages<F>(
        &self,
        mut callback: F,
    ) -> Result<MessageSubscription, MessageStoreError>
    where
        F: FnMut(Vec<ContactMessage>) + Send + 'static,
    {
        let stream = self.contact_messages().await?;
        let task = tokio::spawn(async move {
            let mut stream = std::pin::pin!(stream);
            while let Some(messages) = stream.next().await {
                debug!(count = messages.len(), "Delivering contact message snapshot");
                callback(messages);
            }
            debug!("Contact message subscription ended");
        });
        Ok(MessageSubscription { task })
    }

    /// Read the current newest-first list once.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn fetch_contact_messages(&self) -> Result<Vec<ContactMessage>, MessageStoreError> {
        let value = self.db.get(COLLECTION).await?;
        Ok(messages_from_snapshot(value))
    }

    /// Set a message's status. Only the status field is written.
    ///
    /// Observers see the change when the database pushes it back; there is no
    /// local echo.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not a single key or the write fails.
    #[instrument(skip(self), fields(message_id = %id))]
    pub async fn update_message_status(
        &self,
        id: &MessageId,
        status: MessageStatus,
    ) -> Result<(), MessageStoreError> {
        let path = format!("{COLLECTION}/{}/status", checked_key(id)?);
        self.db.set(&path, Value::from(status.as_str())).await?;
        info!(%status, "Message status updated");
        Ok(())
    }

    /// Permanently delete a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not a single key or the delete fails.
    #[instrument(skip(self), fields(message_id = %id))]
    pub async fn delete_message(&self, id: &MessageId) -> Result<(), MessageStoreError> {
        let path = format!("{COLLECTION}/{}", checked_key(id)?);
        self.db.remove(&path).await?;
        info!("Message deleted");
        Ok(())
    }
}

/// A message id must name exactly one child of the collection.
fn checked_key(id: &MessageId) -> Result<&str, MessageStoreError> {
    let key = id.as_str();
    if key.is_empty() || key.contains('/') {
        return Err(MessageStoreError::InvalidId(key.to_string()));
    }
    Ok(key)
}

/// Rebuild the message list from a full collection snapshot.
///
/// Each child key becomes the message id. Children that do not decode are
/// skipped. The result is ordered by `created_at`, newest first, with ties
/// broken by id (descending) so every observer sees the same order.
fn messages_from_snapshot(snapshot: Value) -> Vec<ContactMessage> {
    let children = match snapshot {
        Value::Object(children) => children,
        Value::Null => return Vec::new(),
        other => {
            warn!(kind = %json_kind(&other), "Contact message collection is not an object");
            return Vec::new();
        }
    };

    let mut messages: Vec<ContactMessage> = children
        .into_iter()
        .filter_map(|(key, child)| match serde_json::from_value::<MessageEntry>(child) {
            Ok(entry) => Some(ContactMessage::from_entry(MessageId::new(key), entry)),
            Err(e) => {
                warn!(message_id = %key, error = %e, "Skipping malformed contact message");
                None
            }
        })
        .collect();

    messages.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    messages
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Live contact message listener.
///
/// Dropping the handle, or calling [`MessageSubscription::unsubscribe`],
/// detaches the listener. In-flight writes are not affected.
#[must_use = "dropping the subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct MessageSubscription {
    task: JoinHandle<()>,
}

impl MessageSubscription {
    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the listener is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
