//! Integration tests for the message store.
//!
//! The store is driven against the in-process realtime database. A second
//! store handle over the same database stands in for another client (the
//! admin view) so changes are observed the way a remote subscriber sees them.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use bistro_core::MessageStatus;
use bistro_integration_tests::{contact, next_snapshot, snapshot_where};
use bistro_storefront::messages::{COLLECTION, MessageStore, MessageStoreError};
use bistro_storefront::realtime::{MemoryDatabase, RealtimeDatabase};
use chrono::DateTime;
use serde_json::json;
use tokio::sync::mpsc;

fn clients() -> (MessageStore, MessageStore, MemoryDatabase) {
    let db = MemoryDatabase::new();
    let customer = MessageStore::new(Arc::new(db.clone()));
    let admin = MessageStore::new(Arc::new(db.clone()));
    (customer, admin, db)
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_snapshots_are_newest_first() {
    let (_, admin, db) = clients();
    let older = contact("Older").into_entry(DateTime::from_timestamp_millis(1_000).unwrap());
    let newer = contact("Newer").into_entry(DateTime::from_timestamp_millis(2_000).unwrap());
    db.set(&format!("{COLLECTION}/k1"), serde_json::to_value(&older).unwrap())
        .await
        .unwrap();
    db.set(&format!("{COLLECTION}/k2"), serde_json::to_value(&newer).unwrap())
        .await
        .unwrap();

    let messages = admin.fetch_contact_messages().await.unwrap();
    let subjects: Vec<&str> = messages.iter().map(|m| m.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Newer", "Older"]);
}

#[tokio::test]
async fn test_subscriber_sees_messages_from_other_clients() {
    let (customer, admin, _db) = clients();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = admin
        .subscribe_to_contact_messages(move |messages| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();
    assert!(next_snapshot(&mut rx).await.is_empty());

    let first = customer.store_contact_message(contact("First")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = customer.store_contact_message(contact("Second")).await.unwrap();

    let snapshot = snapshot_where(&mut rx, |m| m.len() == 2).await;
    assert_eq!(snapshot[0].id, second.id);
    assert_eq!(snapshot[1].id, first.id);
    assert!(snapshot[0].created_at > snapshot[1].created_at);
    assert!(snapshot.iter().all(|m| m.status == MessageStatus::Unread));
}

// =============================================================================
// Admin Actions
// =============================================================================

#[tokio::test]
async fn test_reply_changes_only_status() {
    let (customer, admin, db) = clients();
    let stored = customer.store_contact_message(contact("Allergies")).await.unwrap();
    let before = db.get(&format!("{COLLECTION}/{}", stored.id)).await.unwrap();

    admin
        .update_message_status(&stored.id, MessageStatus::Replied)
        .await
        .unwrap();

    let after = db.get(&format!("{COLLECTION}/{}", stored.id)).await.unwrap();
    let mut expected = before;
    expected["status"] = json!("replied");
    assert_eq!(after, expected);

    let messages = admin.fetch_contact_messages().await.unwrap();
    assert_eq!(messages[0].status, MessageStatus::Replied);
    assert_eq!(messages[0].subject, "Allergies");
    assert_eq!(messages[0].created_at, stored.created_at);
}

#[tokio::test]
async fn test_deleted_message_disappears_from_later_snapshots() {
    let (customer, admin, _db) = clients();
    let keep = customer.store_contact_message(contact("Keep")).await.unwrap();
    let gone = customer.store_contact_message(contact("Spam")).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = admin
        .subscribe_to_contact_messages(move |messages| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();
    assert_eq!(next_snapshot(&mut rx).await.len(), 2);

    admin.delete_message(&gone.id).await.unwrap();

    let snapshot = next_snapshot(&mut rx).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, keep.id);
    assert!(snapshot.iter().all(|m| m.id != gone.id));
}

#[tokio::test]
async fn test_status_change_reaches_subscribers_without_local_echo() {
    let (_, admin, _db) = clients();
    let stored = admin.store_contact_message(contact("Hours")).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = admin
        .subscribe_to_contact_messages(move |messages| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();
    assert_eq!(next_snapshot(&mut rx).await[0].status, MessageStatus::Unread);

    admin
        .update_message_status(&stored.id, MessageStatus::Read)
        .await
        .unwrap();
    assert_eq!(next_snapshot(&mut rx).await[0].status, MessageStatus::Read);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_write_surfaces_and_leaves_subscribers_alone() {
    let (customer, admin, db) = clients();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = admin
        .subscribe_to_contact_messages(move |messages| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();
    assert!(next_snapshot(&mut rx).await.is_empty());

    db.fail_writes(Some("permission denied"));
    let err = customer
        .store_contact_message(contact("Lost"))
        .await
        .unwrap_err();
    assert!(matches!(err, MessageStoreError::Database(_)));

    db.fail_writes(None);
    customer.store_contact_message(contact("Found")).await.unwrap();
    let snapshot = next_snapshot(&mut rx).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].subject, "Found");
    assert!(sub.is_active());
}

#[tokio::test]
async fn test_malformed_entries_are_skipped() {
    let (customer, admin, db) = clients();
    customer.store_contact_message(contact("Valid")).await.unwrap();
    db.set(&format!("{COLLECTION}/broken"), json!({"status": "read"}))
        .await
        .unwrap();

    let messages = admin.fetch_contact_messages().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "Valid");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let (customer, admin, db) = clients();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = admin
        .subscribe_to_contact_messages(move |messages| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();
    next_snapshot(&mut rx).await;

    sub.unsubscribe();
    customer.store_contact_message(contact("After")).await.unwrap();

    // The sender lives in the aborted task; the channel closes once it is dropped.
    let mut late = Vec::new();
    let closed = tokio::time::timeout(bistro_integration_tests::SNAPSHOT_TIMEOUT, async {
        while let Some(snapshot) = rx.recv().await {
            late.push(snapshot);
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(
        late.iter().flatten().all(|m| m.subject != "After"),
        "snapshot delivered after unsubscribe"
    );
    assert_eq!(db.watcher_count(), 0);
}
