// ============================================================================
// Persistence Store
// ============================================================================
//
// Durable storage for order aggregates, keyed by `order_uid`.
//
// Implementations:
// - postgres/ - four-table relational store (orders, delivery, payment, items)
// - memory/   - in-process fake with fault injection, used by tests
//
// ============================================================================

mod postgres;
#[cfg(test)]
pub(crate) mod memory;

pub use postgres::PostgresStorage;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::order::Order;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("order not found")]
    NotFound,

    #[error("{op}: {source}")]
    Database {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StorageError {
    /// Wraps a driver error with the name of the failing operation.
    pub fn database(op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { op, source }
    }

    /// True when the database refused the data itself (SQLSTATE class 22 data
    /// exception or 23 integrity violation). Retrying the same write cannot
    /// succeed.
    pub fn is_data_rejection(&self) -> bool {
        match self {
            Self::Database {
                source: sqlx::Error::Database(db),
                ..
            } => db
                .code()
                .is_some_and(|code| code.starts_with("22") || code.starts_with("23")),
            _ => false,
        }
    }
}

/// Result of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// An aggregate with the same `order_uid` was already stored; nothing was written.
    AlreadyExists,
}

#[async_trait]
pub trait OrderStorage: Send + Sync {
    /// Atomically stores the whole aggregate. Storing an `order_uid` that
    /// already exists writes nothing to any table and is not an error.
    async fn create_order(&self, order: &Order) -> Result<CreateOutcome, StorageError>;

    async fn get_order(&self, order_uid: &str) -> Result<Order, StorageError>;

    async fn list_order_uids(&self) -> Result<Vec<String>, StorageError>;

    async fn close(&self) -> Result<(), StorageError>;

    /// Loads every stored aggregate. Identifiers that vanish between the
    /// enumeration and the point read are skipped.
    async fn get_all_orders(&self) -> Result<HashMap<String, Order>, StorageError> {
        let uids = self.list_order_uids().await?;
        let mut orders = HashMap::with_capacity(uids.len());

        for uid in uids {
            match self.get_order(&uid).await {
                Ok(order) => {
                    orders.insert(uid, order);
                }
                Err(StorageError::NotFound) => {
                    tracing::debug!(order_uid = %uid, "Order disappeared during enumeration, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(orders)
    }
}
