// ============================================================================
// Ingestion
// ============================================================================
//
// The single consuming loop that turns log records into stored orders.
//
// ============================================================================

mod consumer;

pub use consumer::OrderConsumer;
