use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CreateOutcome, OrderStorage, StorageError};
use crate::domain::order::Order;

/// In-process store with switchable failures for exercising the service and
/// consumer without a database.
#[derive(Default)]
pub(crate) struct InMemoryStorage {
    orders: Mutex<HashMap<String, Order>>,
    vanished: Mutex<HashSet<String>>,
    failing_creates: AtomicU32,
    rejecting_code: Mutex<Option<&'static str>>,
    failing_reads: AtomicBool,
    create_calls: AtomicUsize,
    read_calls: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The next `count` creates fail with a database error.
    pub(crate) fn fail_next_creates(&self, count: u32) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// Every create fails as if the database refused the row with `code`.
    pub(crate) fn reject_creates_with(&self, code: &'static str) {
        *self.rejecting_code.lock() = Some(code);
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.failing_reads.store(fail, Ordering::SeqCst);
    }

    /// Keeps `order_uid` in the enumeration but reports it missing on point reads.
    pub(crate) fn vanish_on_read(&self, order_uid: &str) {
        self.vanished.lock().insert(order_uid.to_string());
    }

    pub(crate) fn stored_count(&self) -> usize {
        self.orders.lock().len()
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn unavailable(op: &'static str) -> StorageError {
        StorageError::database(op)(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl OrderStorage for InMemoryStorage {
    async fn create_order(&self, order: &Order) -> Result<CreateOutcome, StorageError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Self::unavailable("storage.memory.create_order"));
        }
        if let Some(code) = *self.rejecting_code.lock() {
            return Err(StorageError::database("storage.memory.create_order")(
                rejected_by_database(code),
            ));
        }

        let mut orders = self.orders.lock();
        if orders.contains_key(&order.order_uid) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(CreateOutcome::Created)
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, StorageError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("storage.memory.get_order"));
        }
        if self.vanished.lock().contains(order_uid) {
            return Err(StorageError::NotFound);
        }
        self.orders
            .lock()
            .get(order_uid)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_order_uids(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.orders.lock().keys().cloned().collect())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A driver error carrying a SQLSTATE, as Postgres reports a refused row.
pub(crate) fn rejected_by_database(code: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(RejectedRow { code }))
}

#[derive(Debug)]
struct RejectedRow {
    code: &'static str,
}

impl fmt::Display for RejectedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row rejected with SQLSTATE {}", self.code)
    }
}

impl std::error::Error for RejectedRow {}

impl sqlx::error::DatabaseError for RejectedRow {
    fn message(&self) -> &str {
        "row rejected"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.code))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::Other
    }
}
