// ============================================================================
// Order Validation Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("order_uid is required")]
    MissingOrderUid,

    #[error("track_number is required")]
    MissingTrackNumber,

    #[error("entry is required")]
    MissingEntry,

    #[error("at least one item is required")]
    EmptyItems,
}
