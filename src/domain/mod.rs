// ============================================================================
// Domain Layer
// ============================================================================
//
// Aggregates decoded from the message log and served to readers.
//
// ============================================================================

pub mod order;
