// ============================================================================
// Order Domain
// ============================================================================
//
// This module contains the Order aggregate and everything it owns:
// - Value objects (Delivery, Payment, Item)
// - Aggregate root (Order) with its structural validator
// - Errors (ValidationError)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::{Delivery, Item, Payment};
pub use aggregate::Order;
