//! Order store: durable, observable collection of pre-orders.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bistro_core::{NewPreOrder, OrderId, OrderStatus, PreOrder};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::subscribers::{RegistryHandle, Subscribers};
use crate::storage::{LocalStorage, StorageError};

/// Key under which the whole order collection is persisted.
pub const STORAGE_KEY: &str = "restaurant_preorders";

/// Errors from order store operations.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// Reading or writing local storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The collection could not be encoded for storage.
    #[error("failed to serialize orders: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable, observable collection of pre-orders.
///
/// Cheaply cloneable; clones share the same collection and subscribers.
pub struct OrderStore<S> {
    inner: Arc<OrderStoreInner<S>>,
}

impl<S> Clone for OrderStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct OrderStoreInner<S> {
    storage: S,
    state: Mutex<OrderState>,
    /// Held from a mutation's commit through the end of its notification, so
    /// subscribers see snapshots in commit order.
    delivery: Mutex<()>,
    subscribers: Subscribers<Vec<PreOrder>>,
}

struct OrderState {
    orders: Vec<PreOrder>,
    /// Millisecond value of the most recently issued id.
    last_id: i64,
}

impl OrderState {
    /// Next id: the current time in milliseconds, bumped past the last issued
    /// id so two orders created in the same millisecond never collide.
    fn next_id(&mut self, now: DateTime<Utc>) -> OrderId {
        let id = now.timestamp_millis().max(self.last_id.saturating_add(1));
        self.last_id = id;
        OrderId::new(id.to_string())
    }
}

impl<S: LocalStorage> OrderStore<S> {
    /// Open the store, loading whatever was persisted under [`STORAGE_KEY`].
    ///
    /// Missing data yields an empty store. Data that cannot be decoded is
    /// logged and discarded; the next mutation overwrites it.
    ///
    /// # Errors
    ///
    /// Returns `OrderStoreError::Storage` if the storage backend cannot be read.
    pub fn open(storage: S) -> Result<Self, OrderStoreError> {
        let orders = match storage.get(STORAGE_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<PreOrder>>(&raw) {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(error = %e, key = STORAGE_KEY, "Discarding malformed persisted orders");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let last_id = orders
            .iter()
            .filter_map(|order| order.id.as_str().parse::<i64>().ok())
            .max()
            .unwrap_or(0);

        info!(count = orders.len(), "Order store opened");

        Ok(Self {
            inner: Arc::new(OrderStoreInner {
                storage,
                state: Mutex::new(OrderState { orders, last_id }),
                delivery: Mutex::new(()),
                subscribers: Subscribers::default(),
            }),
        })
    }

    /// Place a new pre-order.
    ///
    /// Assigns the id, sets the status to pending, stamps both timestamps and
    /// freezes the total from the item prices. The whole collection is then
    /// persisted and every subscriber notified.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be persisted. The order stays
    /// in memory but subscribers are not notified.
    pub fn create_order(&self, input: NewPreOrder) -> Result<PreOrder, OrderStoreError> {
        let _delivery = self.lock_delivery();
        let now = Utc::now();
        let (order, snapshot) = {
            let mut state = self.lock_state();
            let id = state.next_id(now);
            let order = PreOrder::place(id, input, now);
            state.orders.push(order.clone());
            self.persist(&state.orders)?;
            (order, state.orders.clone())
        };

        info!(
            order_id = %order.id,
            items = order.items.len(),
            total = %order.total_amount,
            "Pre-order created"
        );
        self.notify(&snapshot);
        Ok(order)
    }

    /// Change the status of an existing order.
    ///
    /// Returns `Ok(None)` without touching anything if no order has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be persisted.
    pub fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<PreOrder>, OrderStoreError> {
        let _delivery = self.lock_delivery();
        let (order, snapshot) = {
            let mut state = self.lock_state();
            let Some(order) = state.orders.iter_mut().find(|o| &o.id == order_id) else {
                debug!(order_id = %order_id, "Status update for unknown order ignored");
                return Ok(None);
            };
            let previous = order.status;
            order.set_status(status, Utc::now());
            let order = order.clone();
            info!(order_id = %order_id, from = %previous, to = %status, "Order status updated");

            self.persist(&state.orders)?;
            (order, state.orders.clone())
        };

        self.notify(&snapshot);
        Ok(Some(order))
    }

    /// Register `callback` for collection changes.
    ///
    /// The callback is invoked immediately with the current collection, then
    /// once after every successful mutation. Each call receives its own copy,
    /// and copies arrive in the order the mutations were committed.
    /// Dropping the returned handle unsubscribes.
    ///
    /// Callbacks may read the store but must not mutate it.
    pub fn subscribe<F>(&self, callback: F) -> OrderSubscription
    where
        F: Fn(Vec<PreOrder>) + Send + Sync + 'static,
    {
        let _delivery = self.lock_delivery();
        let callback = Arc::new(callback);
        let id = self.inner.subscribers.insert(callback.clone());
        let handle = self.inner.subscribers.handle(id);

        callback(self.orders());
        OrderSubscription { handle }
    }

    /// Copy of the current collection, in creation order.
    #[must_use]
    pub fn orders(&self) -> Vec<PreOrder> {
        self.lock_state().orders.clone()
    }

    /// Look up a single order.
    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<PreOrder> {
        self.lock_state()
            .orders
            .iter()
            .find(|o| &o.id == order_id)
            .cloned()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, OrderState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.inner
            .delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, orders: &[PreOrder]) -> Result<(), OrderStoreError> {
        let raw = serde_json::to_string(orders)?;
        self.inner.storage.set(STORAGE_KEY, &raw)?;
        Ok(())
    }

    /// Called with the state lock released so listeners may read the store,
    /// and with the delivery lock held.
    fn notify(&self, snapshot: &[PreOrder]) {
        let listeners = self.inner.subscribers.listeners();
        debug!(subscribers = listeners.len(), "Notifying order subscribers");
        for listener in listeners {
            listener(snapshot.to_vec());
        }
    }
}

/// Live registration of an order store callback.
///
/// Dropping the handle, or calling [`OrderSubscription::unsubscribe`], removes
/// the callback.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct OrderSubscription {
    handle: RegistryHandle<Vec<PreOrder>>,
}

impl OrderSubscription {
    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_registered()
    }
}

impl Drop for OrderSubscription {
    fn drop(&mut self) {
        self.handle.remove();
    }
}

impl std::fmt::Debug for OrderSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bistro_core::{Cart, Customer, Email, MenuItem, Price};
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::storage::MemoryStorage;

    fn new_order() -> NewPreOrder {
        let mut cart = Cart::new();
        cart.add_quantity(MenuItem::new(1, "Risotto", Price::from_cents(1000)), 2);
        cart.add(MenuItem::new(2, "Bruschetta", Price::from_cents(500)));
        cart.checkout(
            Customer {
                name: "Ada".to_string(),
                email: Email::parse("ada@example.com").unwrap(),
                phone: "555-0100".to_string(),
            },
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_create_order_assigns_pending_and_total() {
        let store = OrderStore::open(MemoryStorage::new()).unwrap();
        let order = store.create_order(new_order()).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Price::from_cents(2500));
        assert_eq!(order.created_at, order.updated_at);
        assert_eq!(store.get(&order.id), Some(order));
    }

    #[test]
    fn test_ids_unique_under_burst() {
        let store = OrderStore::open(MemoryStorage::new()).unwrap();
        let ids: HashSet<_> = (0..200)
            .map(|_| store.create_order(new_order()).unwrap().id)
            .collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_ids_stay_unique_across_reopen() {
        let storage = MemoryStorage::new();
        let first = OrderStore::open(storage.clone()).unwrap();
        let a = first.create_order(new_order()).unwrap();
        drop(first);

        let second = OrderStore::open(storage).unwrap();
        let b = second.create_order(new_order()).unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.id.as_str().parse::<i64>().unwrap() > a.id.as_str().parse::<i64>().unwrap());
    }

    #[test]
    fn test_update_unknown_order_is_noop() {
        let storage = MemoryStorage::new();
        let store = OrderStore::open(storage.clone()).unwrap();
        store.create_order(new_order()).unwrap();
        let persisted = storage.get(STORAGE_KEY).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = store
            .update_order_status(&OrderId::new("missing"), OrderStatus::Ready)
            .unwrap();

        assert!(result.is_none());
        assert_eq!(storage.get(STORAGE_KEY).unwrap(), persisted);
        // Only the initial call made by subscribe.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_status_refreshes_updated_at() {
        let store = OrderStore::open(MemoryStorage::new()).unwrap();
        let order = store.create_order(new_order()).unwrap();

        let updated = store
            .update_order_status(&order.id, OrderStatus::Preparing)
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Preparing);
        assert!(updated.updated_at >= order.updated_at);
        assert!(updated.updated_at >= updated.created_at);
        assert_eq!(updated.created_at, order.created_at);
        assert_eq!(updated.total_amount, order.total_amount);
    }

    #[test]
    fn test_subscribe_receives_initial_snapshot() {
        let store = OrderStore::open(MemoryStorage::new()).unwrap();
        store.create_order(new_order()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |orders| sink.lock().unwrap().push(orders.len()));

        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = OrderStore::open(MemoryStorage::new()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        assert_eq!(store.subscriber_count(), 1);

        sub.unsubscribe();
        store.create_order(new_order()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_persist_failure_propagates_without_notifying() {
        let storage = MemoryStorage::new();
        let store = OrderStore::open(storage.clone()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        storage.fail_writes(true);
        let result = store.create_order(new_order());

        assert!(matches!(result, Err(OrderStoreError::Storage(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_storage_degrades_to_empty() {
        let storage = MemoryStorage::new();
        storage.set(STORAGE_KEY, "{not json").unwrap();

        let store = OrderStore::open(storage.clone()).unwrap();
        assert!(store.orders().is_empty());

        store.create_order(new_order()).unwrap();
        let reopened = OrderStore::open(storage).unwrap();
        assert_eq!(reopened.orders().len(), 1);
    }

    #[test]
    fn test_callback_may_read_store() {
        let store = OrderStore::open(MemoryStorage::new()).unwrap();
        let reader = store.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |orders| {
            assert_eq!(reader.orders().len(), orders.len());
            sink.fetch_add(1, Ordering::SeqCst);
        });

        store.create_order(new_order()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_mutations_deliver_in_commit_order() {
        let store = OrderStore::open(MemoryStorage::new()).unwrap();
        let early = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&early);
        let _early = store.subscribe(move |orders: Vec<PreOrder>| {
            sink.lock().unwrap().push(orders);
        });
        let late = Arc::new(Mutex::new(Vec::new()));

        let _late = std::thread::scope(|scope| {
            for _ in 0..4 {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..25 {
                        let order = store.create_order(new_order()).unwrap();
                        store
                            .update_order_status(&order.id, OrderStatus::Confirmed)
                            .unwrap();
                    }
                });
            }
            // Joins while the writers are running.
            let sink = Arc::clone(&late);
            let store = store.clone();
            scope
                .spawn(move || {
                    store.subscribe(move |orders: Vec<PreOrder>| {
                        sink.lock().unwrap().push(orders.len());
                    })
                })
                .join()
                .unwrap()
        });

        let final_orders = store.orders();
        assert_eq!(final_orders.len(), 100);

        let early = early.lock().unwrap();
        assert_eq!(early.len(), 201);
        let lengths: Vec<usize> = early.iter().map(Vec::len).collect();
        assert!(lengths.is_sorted());
        assert_eq!(early.last().unwrap(), &final_orders);

        let late = late.lock().unwrap();
        assert!(late.is_sorted());
        assert_eq!(late.last().copied(), Some(100));
    }
}
