//! In-process realtime database.

use std::sync::{Arc, Mutex, PoisonError};

use async_stream::stream;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use super::tree::{remove_at, set_at, split_path, value_at};
use super::{DatabaseError, RealtimeDatabase, SnapshotStream};

/// A realtime database held in memory.
///
/// Every write publishes the new tree on a `watch` channel; each watcher
/// projects it onto its own path and yields only when that part changed.
/// Bursts of writes may be coalesced, so a slow watcher can skip intermediate
/// states but always ends on the latest one. Clones share the same tree.
#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<MemoryDatabaseInner>,
}

struct MemoryDatabaseInner {
    root: watch::Sender<Value>,
    failure: Mutex<Option<String>>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        let (root, _) = watch::channel(Value::Null);
        Self {
            inner: Arc::new(MemoryDatabaseInner {
                root,
                failure: Mutex::new(None),
            }),
        }
    }

    /// Make every subsequent write fail with `reason`, or succeed again with
    /// `None`. Reads and watches are unaffected.
    pub fn fail_writes(&self, reason: Option<&str>) {
        *self
            .inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason.map(String::from);
    }

    /// Number of live watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.root.receiver_count()
    }

    fn check_writable(&self) -> Result<(), DatabaseError> {
        let failure = self
            .inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match failure.as_deref() {
            Some(reason) => Err(DatabaseError::Unavailable(reason.to_string())),
            None => Ok(()),
        }
    }

    fn write(&self, segments: &[String], value: Value) {
        self.inner.root.send_if_modified(|root| {
            let before = value_at(root, segments);
            if before == value {
                return false;
            }
            set_at(root, segments, value);
            true
        });
    }
}

#[async_trait]
impl RealtimeDatabase for MemoryDatabase {
    async fn push(&self, path: &str, value: Value) -> Result<String, DatabaseError> {
        self.check_writable()?;
        let mut segments = split_path(path)?;
        let key = uuid::Uuid::new_v4().simple().to_string();
        segments.push(key.clone());
        self.write(&segments, value);
        debug!(path, key = %key, "Pushed child");
        Ok(key)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), DatabaseError> {
        self.check_writable()?;
        let segments = split_path(path)?;
        self.write(&segments, value);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), DatabaseError> {
        self.check_writable()?;
        let segments = split_path(path)?;
        self.inner.root.send_if_modified(|root| {
            if value_at(root, &segments).is_null() {
                return false;
            }
            remove_at(root, &segments);
            true
        });
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Value, DatabaseError> {
        let segments = split_path(path)?;
        Ok(value_at(&self.inner.root.borrow(), &segments))
    }

    async fn watch(&self, path: &str) -> Result<SnapshotStream, DatabaseError> {
        let segments = split_path(path)?;
        let mut rx = self.inner.root.subscribe();

        Ok(Box::pin(stream! {
            let mut last: Option<Value> = None;
            loop {
                let current = value_at(&rx.borrow_and_update(), &segments);
                if last.as_ref() != Some(&current) {
                    last = Some(current.clone());
                    yield Ok(current);
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }))
    }
}
