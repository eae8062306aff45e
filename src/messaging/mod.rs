// ============================================================================
// Message Log Access
// ============================================================================
//
// `MessageSource` is the narrow view of the partitioned log the ingest loop
// needs: fetch the next record, commit past it, or rewind so it is fetched
// again. The Kafka implementation lives in `kafka.rs`.
//
// ============================================================================

mod kafka;

pub use kafka::KafkaOrderSource;

use async_trait::async_trait;
use rdkafka::error::KafkaError;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("kafka: {0}")]
    Kafka(#[from] KafkaError),

    #[error("message source closed")]
    Closed,
}

/// An owned copy of one record fetched from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait MessageSource: Send {
    /// Waits until the next record is available.
    async fn fetch(&mut self) -> Result<InboundMessage, MessagingError>;

    /// Durably advances the group's read position past `message`.
    async fn commit(&mut self, message: &InboundMessage) -> Result<(), MessagingError>;

    /// Repositions the partition so `message` is the next record fetched.
    async fn rewind(&mut self, message: &InboundMessage) -> Result<(), MessagingError>;

    async fn close(&mut self) -> Result<(), MessagingError>;
}
