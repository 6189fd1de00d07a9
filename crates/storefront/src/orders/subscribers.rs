//! Observer registry shared by a store and its subscription handles.

use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Callback invoked with an owned snapshot.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Registry slot identifier, unique for the lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Registry<T> {
    next_id: u64,
    entries: Vec<(SubscriberId, Callback<T>)>,
}

/// Ordered collection of listeners.
///
/// Listeners are called in registration order.
pub struct Subscribers<T> {
    inner: Arc<Mutex<Registry<T>>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<T> Subscribers<T> {
    /// Register a listener.
    pub fn insert(&self, callback: Callback<T>) -> SubscriberId {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = SubscriberId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push((id, callback));
        id
    }

    /// Clone out the current listeners so they can be called without holding
    /// the registry lock.
    pub fn listeners(&self) -> Vec<Callback<T>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// A handle that can remove `id` without keeping the registry alive.
    pub fn handle(&self, id: SubscriberId) -> RegistryHandle<T> {
        RegistryHandle {
            registry: Arc::downgrade(&self.inner),
            id,
        }
    }
}

/// Weak reference to one registry slot.
pub struct RegistryHandle<T> {
    registry: Weak<Mutex<Registry<T>>>,
    id: SubscriberId,
}

impl<T> RegistryHandle<T> {
    /// Remove the slot. Returns `false` if it was already gone.
    pub fn remove(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.entries.len();
        registry.entries.retain(|(id, _)| *id != self.id);
        registry.entries.len() != before
    }

    pub fn is_registered(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .iter()
                .any(|(id, _)| *id == self.id)
        })
    }
}
