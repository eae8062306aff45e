use std::sync::Arc;

use super::ServiceError;
use crate::cache::OrderCache;
use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::storage::{CreateOutcome, OrderStorage, StorageError};

pub struct OrderService {
    storage: Arc<dyn OrderStorage>,
    cache: Arc<dyn OrderCache>,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(
        storage: Arc<dyn OrderStorage>,
        cache: Arc<dyn OrderCache>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            storage,
            cache,
            metrics,
        }
    }

    /// Persist the order, then publish it to the cache.
    ///
    /// The cache is only touched after the store wrote the aggregate, so it
    /// never holds an order the store does not have. Calling again for a stored
    /// `order_uid` writes nothing to either.
    pub async fn create_order(&self, order: &Order) -> Result<(), ServiceError> {
        if order.order_uid.is_empty() {
            tracing::error!("Order UID is empty");
            return Err(ServiceError::InvalidInput("order_uid is required".into()));
        }

        let outcome = self.storage.create_order(order).await.map_err(|e| {
            tracing::error!(error = %e, order_uid = %order.order_uid, "Failed to create order");
            ServiceError::Storage(e)
        })?;

        match outcome {
            CreateOutcome::Created => {
                self.cache.set(Arc::new(order.clone()));
                self.metrics.set_cache_size(self.cache.len());
                tracing::info!(order_uid = %order.order_uid, "Order created and cached");
            }
            CreateOutcome::AlreadyExists => {
                // the incoming copy was not stored; a later read fills from the store
                tracing::info!(order_uid = %order.order_uid, "Order already stored, cache untouched");
            }
        }

        Ok(())
    }

    /// Cache-aside lookup. A miss that the store also misses is not cached.
    pub async fn get_order(&self, order_uid: &str) -> Result<Arc<Order>, ServiceError> {
        if let Some(order) = self.cache.get(order_uid) {
            self.metrics.record_cache_lookup(true);
            tracing::debug!(order_uid = %order_uid, "Order retrieved from cache");
            return Ok(order);
        }
        self.metrics.record_cache_lookup(false);

        let order = match self.storage.get_order(order_uid).await {
            Ok(order) => Arc::new(order),
            Err(StorageError::NotFound) => {
                tracing::warn!(order_uid = %order_uid, "Order not found in storage");
                return Err(ServiceError::NotFound(order_uid.to_string()));
            }
            Err(e) => {
                tracing::error!(error = %e, order_uid = %order_uid, "Failed to get order from storage");
                return Err(ServiceError::Storage(e));
            }
        };

        self.cache.set(order.clone());
        self.metrics.set_cache_size(self.cache.len());
        tracing::debug!(order_uid = %order_uid, "Order retrieved from storage and cached");

        Ok(order)
    }

    /// Seed the cache with every stored order. Entries already present (from
    /// a create that raced ahead of the restore) are left alone.
    pub async fn restore_cache(&self) -> Result<usize, ServiceError> {
        let orders = self.storage.get_all_orders().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to get all orders");
            ServiceError::Storage(e)
        })?;

        let total = orders.len();
        let mut restored = 0;
        for order in orders.into_values() {
            if self.cache.set_if_absent(Arc::new(order)) {
                restored += 1;
            }
        }
        self.metrics.set_cache_size(self.cache.len());

        tracing::info!(orders_count = total, restored = restored, "Cache restored");
        Ok(restored)
    }

    pub async fn close(&self) -> Result<(), ServiceError> {
        self.storage.close().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to close storage");
            ServiceError::Storage(e)
        })?;

        tracing::info!("Order service closed");
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryOrderCache;
    use crate::storage::memory::InMemoryStorage;

    struct Harness {
        storage: Arc<InMemoryStorage>,
        cache: Arc<InMemoryOrderCache>,
        service: OrderService,
    }

    fn harness_over(storage: Arc<InMemoryStorage>) -> Harness {
        let cache = Arc::new(InMemoryOrderCache::new());
        let service = OrderService::new(
            storage.clone(),
            cache.clone(),
            Arc::new(Metrics::new().unwrap()),
        );
        Harness {
            storage,
            cache,
            service,
        }
    }

    fn harness() -> Harness {
        harness_over(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_create_rejects_empty_uid_without_touching_storage() {
        let h = harness();
        let order = Order::sample("");

        let err = h.service.create_order(&order).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(h.storage.create_calls(), 0);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let h = harness();
        let order = Order::sample("A1");

        h.service.create_order(&order).await.unwrap();
        h.service.create_order(&order).await.unwrap();

        assert_eq!(h.storage.stored_count(), 1);
        assert_eq!(h.cache.len(), 1);
        assert_eq!(*h.service.get_order("A1").await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_duplicate_create_keeps_first_aggregate() {
        let h = harness();
        let first = Order::sample("A1");
        h.service.create_order(&first).await.unwrap();

        let mut second = Order::sample("A1");
        second.locale = "ru".to_string();
        h.service.create_order(&second).await.unwrap();

        assert_eq!(*h.cache.get("A1").unwrap(), first);
        h.cache.remove("A1");
        assert_eq!(*h.service.get_order("A1").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_duplicate_create_never_caches_unstored_content() {
        let h = harness();
        let first = Order::sample("A1");
        h.service.create_order(&first).await.unwrap();
        h.cache.remove("A1");

        let mut second = Order::sample("A1");
        second.locale = "ru".to_string();
        h.service.create_order(&second).await.unwrap();

        assert!(h.cache.get("A1").is_none());
        let served = h.service.get_order("A1").await.unwrap();
        assert_eq!(*served, first);
        assert_eq!(served.locale, "en");
    }

    #[tokio::test]
    async fn test_failed_create_does_not_populate_cache() {
        let h = harness();
        h.storage.fail_next_creates(1);

        let err = h.service.create_order(&Order::sample("A1")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Storage(_)));
        assert!(h.cache.get("A1").is_none());
    }

    #[tokio::test]
    async fn test_read_after_create_is_served_from_cache() {
        let h = harness();
        let order = Order::sample("A1");
        h.service.create_order(&order).await.unwrap();

        h.storage.fail_reads(true);
        let found = h.service.get_order("A1").await.unwrap();

        assert_eq!(*found, order);
        assert_eq!(h.storage.read_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_fills_from_storage() {
        let h = harness();
        let order = Order::sample("A1");
        h.service.create_order(&order).await.unwrap();
        h.cache.remove("A1");

        let found = h.service.get_order("A1").await.unwrap();

        assert_eq!(*found, order);
        assert_eq!(h.storage.read_calls(), 1);
        assert_eq!(*h.cache.get("A1").unwrap(), order);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let h = harness();

        let err = h.service.get_order("A1").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref uid) if uid == "A1"));

        let order = Order::sample("A1");
        h.service.create_order(&order).await.unwrap();

        assert_eq!(*h.service.get_order("A1").await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_storage_failure_on_miss_is_storage_error() {
        let h = harness();
        h.storage.fail_reads(true);

        let err = h.service.get_order("A1").await.unwrap_err();

        assert!(matches!(err, ServiceError::Storage(_)));
        assert!(h.cache.get("A1").is_none());
    }

    #[tokio::test]
    async fn test_restore_after_restart_serves_from_cache() {
        let storage = Arc::new(InMemoryStorage::new());
        let order = Order::sample("A1");
        {
            let h = harness_over(storage.clone());
            h.service.create_order(&order).await.unwrap();
            assert_eq!(*h.service.get_order("A1").await.unwrap(), order);
        }

        // fresh process: empty cache over the same store
        let h = harness_over(storage);
        assert!(h.cache.is_empty());

        assert_eq!(h.service.restore_cache().await.unwrap(), 1);

        h.storage.fail_reads(true);
        let reads_before = h.storage.read_calls();
        assert_eq!(*h.service.get_order("A1").await.unwrap(), order);
        assert_eq!(h.storage.read_calls(), reads_before);
    }

    #[tokio::test]
    async fn test_restore_does_not_overwrite_fresh_entries() {
        let h = harness();
        h.service.create_order(&Order::sample("A1")).await.unwrap();

        let mut fresher = Order::sample("A1");
        fresher.locale = "ru".to_string();
        h.cache.set(Arc::new(fresher));

        assert_eq!(h.service.restore_cache().await.unwrap(), 0);
        assert_eq!(h.cache.get("A1").unwrap().locale, "ru");
    }

    #[tokio::test]
    async fn test_restore_reports_storage_failure() {
        let h = harness();
        h.service.create_order(&Order::sample("A1")).await.unwrap();
        h.cache.remove("A1");
        h.storage.fail_reads(true);

        assert!(h.service.restore_cache().await.is_err());
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_close_closes_storage() {
        let h = harness();
        h.service.close().await.unwrap();
        assert!(h.storage.is_closed());
    }
}
