use crate::core::{CommitError, PublishError, StoreError, StoreResult};
use crate::model::{CommandBatch, EventRecord};
use crate::publish::EventPublisher;
use crate::transaction::{TransactionBoundary, TransactionHandle, TransactionId, with_transaction};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Proof that a batch's effects are durable.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub transaction_id: TransactionId,
    pub event: EventRecord,
    pub committed_at: DateTime<Utc>,
}

/// Applies one batch inside an open transaction, event first.
///
/// Group order is fixed: table, seats, hand, hand players, wallet. Empty
/// groups are skipped without touching the handle.
pub async fn apply_batch<H>(tx: &mut H, batch: &CommandBatch) -> StoreResult<()>
where
    H: TransactionHandle + ?Sized,
{
    tx.append_event(batch.event()).await?;

    if let Some(table) = batch.table() {
        tx.update_table(table).await?;
    }
    if !batch.seats().is_empty() {
        tx.update_seats(batch.seats()).await?;
    }
    if let Some(hand) = batch.hand() {
        tx.update_hand(hand).await?;
    }
    if !batch.hand_players().is_empty() {
        tx.upsert_hand_players(batch.hand_players()).await?;
    }
    if !batch.wallet_transactions().is_empty() {
        tx.append_wallet_transactions(batch.wallet_transactions())
            .await?;
    }
    Ok(())
}

/// Commit-then-publish pipeline.
///
/// Performs no deduplication and no retries; callers classify commands with an
/// [`IdempotencyCache`](crate::idempotency::IdempotencyCache) first and own any
/// retry policy.
pub struct CommandPipeline<B, P> {
    boundary: Arc<B>,
    publisher: Arc<P>,
}

impl<B, P> Clone for CommandPipeline<B, P> {
    fn clone(&self) -> Self {
        Self {
            boundary: Arc::clone(&self.boundary),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<B, P> CommandPipeline<B, P>
where
    B: TransactionBoundary,
    P: EventPublisher,
{
    pub fn new(boundary: Arc<B>, publisher: Arc<P>) -> Self {
        Self {
            boundary,
            publisher,
        }
    }

    pub fn boundary(&self) -> &Arc<B> {
        &self.boundary
    }

    pub fn publisher(&self) -> &Arc<P> {
        &self.publisher
    }

    /// Commits `batch` atomically, then publishes its event exactly once.
    ///
    /// Publish is never attempted unless the commit succeeded. A publish
    /// failure does not undo the commit; the receipt travels inside
    /// [`CommitError::PublishFailed`].
    pub async fn commit_and_publish(&self, batch: CommandBatch) -> Result<CommitReceipt, CommitError> {
        let span = info_span!(
            "pipeline.commit",
            table_id = %batch.event().table_id,
            hand_id = %batch.event().hand_id,
            table_seq = batch.event().table_seq,
            hand_seq = batch.event().hand_seq,
            kind = %batch.event().kind
        );

        async move {
            let receipt = self.commit(batch).await?;
            self.publish_committed(receipt).await
        }
        .instrument(span)
        .await
    }

    /// Publishes an already committed event again. Never re-commits.
    pub async fn republish(&self, receipt: &CommitReceipt) -> Result<(), PublishError> {
        let result = self.publisher.publish(&receipt.event).await;
        match &result {
            Ok(()) => event!(Level::INFO, event_id = %receipt.event.event_id, "event republished"),
            Err(err) => event!(
                Level::WARN,
                event_id = %receipt.event.event_id,
                error = %err,
                "event republish failed"
            ),
        }
        result
    }

    async fn commit(&self, batch: CommandBatch) -> Result<CommitReceipt, CommitError> {
        let mutation_groups = batch.mutation_group_count();

        let committed = with_transaction(self.boundary.as_ref(), move |tx| {
            Box::pin(async move {
                apply_batch(&mut *tx, &batch).await?;
                Ok::<_, StoreError>((tx.id(), batch.into_event()))
            })
        })
        .await;

        match committed {
            Ok((transaction_id, event)) => {
                event!(
                    Level::INFO,
                    txn_id = %transaction_id,
                    mutation_groups,
                    "batch committed"
                );
                Ok(CommitReceipt {
                    transaction_id,
                    event,
                    committed_at: Utc::now(),
                })
            }
            Err(err) => {
                event!(
                    Level::WARN,
                    error = %err,
                    transient = err.is_transient(),
                    "batch not committed"
                );
                Err(CommitError::NotCommitted(err))
            }
        }
    }

    async fn publish_committed(&self, receipt: CommitReceipt) -> Result<CommitReceipt, CommitError> {
        match self.publisher.publish(&receipt.event).await {
            Ok(()) => {
                event!(Level::DEBUG, event_id = %receipt.event.event_id, "event published");
                Ok(receipt)
            }
            Err(source) => {
                event!(
                    Level::ERROR,
                    event_id = %receipt.event.event_id,
                    error = %source,
                    "event committed but publish failed"
                );
                Err(CommitError::PublishFailed {
                    receipt: Box::new(receipt),
                    source,
                })
            }
        }
    }
}
