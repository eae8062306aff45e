use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    Message, Offset, TopicPartitionList,
};

use super::{InboundMessage, MessageSource, MessagingError};
use crate::config::KafkaConfig;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Single-reader Kafka consumer with manual offset management.
///
/// Auto-commit is disabled: the read position only moves when the ingest loop
/// calls `commit` after a message has been persisted or dropped.
pub struct KafkaOrderSource {
    consumer: StreamConsumer,
    closed: bool,
}

impl KafkaOrderSource {
    pub fn new(config: &KafkaConfig) -> Result<Self, MessagingError> {
        let consumer: StreamConsumer = client_config(config).create()?;
        consumer.subscribe(&[config.topic.as_str()])?;

        tracing::info!(
            brokers = %config.brokers.join(","),
            topic = %config.topic,
            group_id = %config.group_id,
            "Subscribed to order topic"
        );

        Ok(Self {
            consumer,
            closed: false,
        })
    }
}

fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.brokers.join(","))
        .set("group.id", &config.group_id)
        .set("enable.auto.commit", "false")
        .set("enable.auto.offset.store", "false")
        .set("auto.offset.reset", "latest")
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "6000")
        .set("fetch.min.bytes", "10000")
        .set("fetch.wait.max.ms", "1000");
    client
}

#[async_trait]
impl MessageSource for KafkaOrderSource {
    async fn fetch(&mut self) -> Result<InboundMessage, MessagingError> {
        if self.closed {
            return Err(MessagingError::Closed);
        }

        let message = self.consumer.recv().await?;
        Ok(InboundMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), MessagingError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;

        // Synchronous commit blocks on the broker round trip.
        tokio::task::block_in_place(|| self.consumer.commit(&offsets, CommitMode::Sync))?;
        Ok(())
    }

    async fn rewind(&mut self, message: &InboundMessage) -> Result<(), MessagingError> {
        tokio::task::block_in_place(|| {
            self.consumer.seek(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset),
                SEEK_TIMEOUT,
            )
        })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MessagingError> {
        if !self.closed {
            self.consumer.unsubscribe();
            self.closed = true;
            tracing::info!("Kafka consumer unsubscribed");
        }
        Ok(())
    }
}
