//! Contact message commands.
//!
//! # Usage
//!
//! ```bash
//! bistro messages send -n Grace -e grace@example.com -s "Private dining" -m "Table for 12?"
//! bistro messages list
//! bistro messages watch
//! bistro messages mark -NxYz123 read
//! bistro messages reply -NxYz123
//! bistro messages delete -NxYz123
//! ```
//!
//! Without `BISTRO_REALTIME_URL`, `list` and `watch` run against an in-process
//! database that is empty at startup; commands that write refuse to run, since
//! the write would be gone when the process exits.

use std::io::Write;

use bistro_core::{ContactMessage, MessageId, MessageStatus, NewContactMessage};
use bistro_storefront::config::{ConfigError, StorefrontConfig};
use bistro_storefront::error::{Result, add_breadcrumb};
use bistro_storefront::messages::MessageStore;
use bistro_storefront::realtime;
use tokio::sync::mpsc;
use tracing::info;

/// Connect to the configured realtime database.
///
/// # Errors
///
/// Returns an error if the database client cannot be built.
pub fn open(config: &StorefrontConfig) -> Result<MessageStore> {
    let db = realtime::connect(config.realtime.as_ref())?;
    Ok(MessageStore::new(db))
}

/// Connect to the configured remote database for a command that writes.
///
/// # Errors
///
/// Returns a configuration error if no remote database is configured, or an
/// error if the client cannot be built.
pub fn open_remote(config: &StorefrontConfig) -> Result<MessageStore> {
    if config.realtime.is_none() {
        return Err(ConfigError::MissingEnvVar("BISTRO_REALTIME_URL".to_string()).into());
    }
    open(config)
}

/// Submit a contact message and print its id.
///
/// # Errors
///
/// Returns an error if the write fails.
pub async fn send(
    store: &MessageStore,
    input: NewContactMessage,
    out: &mut impl Write,
) -> Result<()> {
    let message = store.store_contact_message(input).await?;
    add_breadcrumb("messages", "Sent contact message", Some(&[("message_id", message.id.as_str())]));
    writeln!(out, "Sent message {}", message.id)?;
    Ok(())
}

/// Print the inbox once.
///
/// # Errors
///
/// Returns an error if the read fails.
pub async fn list(store: &MessageStore, out: &mut impl Write) -> Result<()> {
    let messages = store.fetch_contact_messages().await?;
    render_messages(out, &messages)?;
    Ok(())
}

/// Print the inbox now and after every change until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the subscription cannot be established or output
/// fails.
pub async fn watch(store: &MessageStore, out: &mut impl Write) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = store
        .subscribe_to_contact_messages(move |messages| {
            // The receiver only goes away once we stop watching.
            let _ = tx.send(messages);
        })
        .await?;
    info!("Watching contact messages, press Ctrl+C to stop");

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(messages) = received else { break };
                render_messages(out, &messages)?;
                writeln!(out)?;
                out.flush()?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Stopping watch");
                break;
            }
        }
    }

    subscription.unsubscribe();
    Ok(())
}

/// Set a message's status.
///
/// # Errors
///
/// Returns an error if the write fails.
pub async fn mark(
    store: &MessageStore,
    message_id: &MessageId,
    status: MessageStatus,
    out: &mut impl Write,
) -> Result<()> {
    store.update_message_status(message_id, status).await?;
    add_breadcrumb(
        "messages",
        "Updated message status",
        Some(&[("message_id", message_id.as_str()), ("status", status.as_str())]),
    );
    writeln!(out, "Message {message_id} marked {}", status.label())?;
    Ok(())
}

/// Delete a message.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub async fn delete(store: &MessageStore, message_id: &MessageId, out: &mut impl Write) -> Result<()> {
    store.delete_message(message_id).await?;
    add_breadcrumb("messages", "Deleted message", Some(&[("message_id", message_id.as_str())]));
    writeln!(out, "Deleted message {message_id}")?;
    Ok(())
}

fn render_messages(out: &mut impl Write, messages: &[ContactMessage]) -> std::io::Result<()> {
    if messages.is_empty() {
        return writeln!(out, "No messages.");
    }
    for message in messages {
        writeln!(
            out,
            "{:<8} {}  {}  {} <{}>  {}",
            message.status.label(),
            message.id,
            message.created_at.format("%Y-%m-%d %H:%M"),
            message.name,
            message.email,
            message.subject
        )?;
    }
    Ok(())
}
