// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates the persistence store and the read cache:
// - create: write-through (store first, cache on success)
// - get:    cache-aside (cache, then store with cache fill)
// - restore_cache: seed the cache from the store at startup
//
// ============================================================================

mod order_service;

pub use order_service::OrderService;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("order {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(StorageError),
}
