use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::order::Order;

// ============================================================================
// Read Cache
// ============================================================================
//
// Unbounded `order_uid -> Order` map shared between the ingest task and the
// query path. Entries live for the whole process; there is no eviction.
// Many readers, one exclusive writer.
//
// ============================================================================

pub trait OrderCache: Send + Sync {
    /// Insert or overwrite the entry for `order.order_uid`.
    fn set(&self, order: Arc<Order>);

    /// Insert only when no entry exists. Returns whether the order was inserted.
    fn set_if_absent(&self, order: Arc<Order>) -> bool;

    fn get(&self, order_uid: &str) -> Option<Arc<Order>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct InMemoryOrderCache {
    data: RwLock<HashMap<String, Arc<Order>>>,
}

impl InMemoryOrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn remove(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.data.write().remove(order_uid)
    }
}

impl OrderCache for InMemoryOrderCache {
    fn set(&self, order: Arc<Order>) {
        self.data.write().insert(order.order_uid.clone(), order);
    }

    fn set_if_absent(&self, order: Arc<Order>) -> bool {
        let mut data = self.data.write();
        if data.contains_key(&order.order_uid) {
            return false;
        }
        data.insert(order.order_uid.clone(), order);
        true
    }

    fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.data.read().get(order_uid).cloned()
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }
}
