use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::domain::order::Order;
use crate::messaging::{InboundMessage, MessageSource};
use crate::metrics::{Metrics, OUTCOME_PERSISTED, OUTCOME_POISON, OUTCOME_REDELIVERY};
use crate::service::{OrderService, ServiceError};
use crate::utils::{Backoff, RetryConfig};

// ============================================================================
// Order Ingest Consumer
// ============================================================================
//
// One dedicated task, one message at a time, in partition order:
//
//   Idle -> Fetching -> Decoding -> Validating -> Persisting -> Committing
//             ^                                                    |
//             +----------------------------------------------------+
//
// Dispositions:
// - decode / validation failure: poison, commit and drop (never retried)
// - persist refused by the database (bad data): poison, commit and drop
// - other persist failure: no commit, rewind to the same offset, back off,
//   refetch; a failed rewind is retried before anything else is fetched
// - persist success: commit
//
// A commit failure is only logged; the broker may redeliver the message and
// the idempotent create absorbs it.
//
// Shutdown is observed while fetching (and while backing off). Work on a
// message that has already been fetched runs to completion. The source is
// closed after the loop exits.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Fetching,
    Decoding,
    Validating,
    Persisting,
    Committing,
    Stopped,
}

/// What to do with the offset of a processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Persisted; advance past it.
    Commit,
    /// Can never succeed; advance past it.
    Drop,
    /// Leave uncommitted and fetch it again.
    Redeliver,
}

pub struct OrderConsumer<S: MessageSource> {
    source: S,
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
    backoff: Backoff,
    shutdown: CancellationToken,
    state: ConsumerState,
}

impl<S: MessageSource> OrderConsumer<S> {
    pub fn new(
        source: S,
        service: Arc<OrderService>,
        metrics: Arc<Metrics>,
        redelivery: RetryConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            service,
            metrics,
            backoff: Backoff::new(redelivery),
            shutdown,
            state: ConsumerState::Idle,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    fn transition(&mut self, next: ConsumerState) {
        tracing::trace!(from = ?self.state, to = ?next, "Consumer state transition");
        self.state = next;
    }

    /// Runs until the shutdown token is cancelled, then closes the source.
    pub async fn run(&mut self) {
        tracing::info!("Starting order consumer");

        loop {
            self.transition(ConsumerState::Fetching);

            let fetched = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                fetched = self.source.fetch() => fetched,
            };

            let message = match fetched {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(error = %e, "Fetch error");
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            let started = Instant::now();
            let disposition = self.process(&message).await;
            let elapsed = started.elapsed().as_secs_f64();

            match disposition {
                Disposition::Commit | Disposition::Drop => {
                    let outcome = if disposition == Disposition::Commit {
                        OUTCOME_PERSISTED
                    } else {
                        OUTCOME_POISON
                    };
                    self.metrics.record_consumed(outcome, elapsed);
                    self.backoff.reset();
                    self.commit(&message).await;
                }
                Disposition::Redeliver => {
                    self.metrics.record_consumed(OUTCOME_REDELIVERY, elapsed);
                    if !self.rewind(&message).await || !self.pause().await {
                        break;
                    }
                }
            }
        }

        self.transition(ConsumerState::Stopped);
        tracing::info!("Stopping order consumer");

        if let Err(e) = self.source.close().await {
            tracing::error!(error = %e, "Failed to close message source");
        }
    }

    async fn process(&mut self, message: &InboundMessage) -> Disposition {
        self.transition(ConsumerState::Decoding);
        let order: Order = match serde_json::from_slice(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    partition = message.partition,
                    offset = message.offset,
                    key = ?message.key.as_deref().map(String::from_utf8_lossy),
                    payload = %String::from_utf8_lossy(&message.payload),
                    "Dropping undecodable message"
                );
                return Disposition::Drop;
            }
        };

        self.transition(ConsumerState::Validating);
        if let Err(e) = order.validate() {
            tracing::error!(
                error = %e,
                order_uid = %order.order_uid,
                partition = message.partition,
                offset = message.offset,
                "Dropping invalid order"
            );
            return Disposition::Drop;
        }

        self.transition(ConsumerState::Persisting);
        tracing::info!(order_uid = %order.order_uid, offset = message.offset, "Processing order");
        match self.service.create_order(&order).await {
            Ok(()) => Disposition::Commit,
            Err(ServiceError::InvalidInput(reason)) => {
                tracing::error!(order_uid = %order.order_uid, reason = %reason, "Dropping rejected order");
                Disposition::Drop
            }
            Err(ServiceError::Storage(e)) if e.is_data_rejection() => {
                tracing::error!(
                    error = %e,
                    order_uid = %order.order_uid,
                    partition = message.partition,
                    offset = message.offset,
                    "Dropping order refused by the database"
                );
                Disposition::Drop
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    order_uid = %order.order_uid,
                    offset = message.offset,
                    "Failed to persist order, leaving offset uncommitted"
                );
                Disposition::Redeliver
            }
        }
    }

    async fn commit(&mut self, message: &InboundMessage) {
        self.transition(ConsumerState::Committing);
        if let Err(e) = self.source.commit(message).await {
            self.metrics.record_commit_failure();
            tracing::error!(
                error = %e,
                partition = message.partition,
                offset = message.offset,
                "Commit error"
            );
        }
    }

    /// Repositions the source on `message`, retrying until it succeeds so the
    /// loop never fetches past an uncommitted failure. Returns false when
    /// shutdown was requested first; the offset is then left uncommitted.
    async fn rewind(&mut self, message: &InboundMessage) -> bool {
        loop {
            match self.source.rewind(message).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        partition = message.partition,
                        offset = message.offset,
                        "Failed to rewind for redelivery, retrying"
                    );
                    if !self.pause().await {
                        return false;
                    }
                }
            }
        }
    }

    /// Backoff wait. Returns false when shutdown was requested meanwhile.
    async fn pause(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
