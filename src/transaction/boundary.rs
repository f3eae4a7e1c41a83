use super::TransactionId;
use crate::core::StoreResult;
use crate::model::{
    EventRecord, HandMutation, HandPlayerUpsert, SeatMutation, TableMutation, WalletTransaction,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use tracing::{Level, event};

/// Operations a transaction handle exposes, plus its commit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxOperation {
    AppendEvent,
    UpdateTable,
    UpdateSeats,
    UpdateHand,
    UpsertHandPlayers,
    AppendWalletTransactions,
    Commit,
}

impl TxOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxOperation::AppendEvent => "append_event",
            TxOperation::UpdateTable => "update_table",
            TxOperation::UpdateSeats => "update_seats",
            TxOperation::UpdateHand => "update_hand",
            TxOperation::UpsertHandPlayers => "upsert_hand_players",
            TxOperation::AppendWalletTransactions => "append_wallet_transactions",
            TxOperation::Commit => "commit",
        }
    }
}

impl fmt::Display for TxOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction-scoped handle.
///
/// Effects of the mutation operations stay invisible outside the handle until
/// `commit` succeeds. A failed `commit` leaves nothing behind. Dropping a handle
/// without committing is a rollback.
#[async_trait]
pub trait TransactionHandle: Send {
    fn id(&self) -> TransactionId;

    async fn append_event(&mut self, event: &EventRecord) -> StoreResult<()>;

    async fn update_table(&mut self, mutation: &TableMutation) -> StoreResult<()>;

    async fn update_seats(&mut self, mutations: &[SeatMutation]) -> StoreResult<()>;

    async fn update_hand(&mut self, mutation: &HandMutation) -> StoreResult<()>;

    async fn upsert_hand_players(&mut self, upserts: &[HandPlayerUpsert]) -> StoreResult<()>;

    async fn append_wallet_transactions(&mut self, entries: &[WalletTransaction])
    -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

/// A persistence backend that can run a batch atomically.
///
/// Implementations own the event ordering invariants and must serialize
/// conflicting commits themselves.
#[async_trait]
pub trait TransactionBoundary: Send + Sync {
    type Tx: TransactionHandle + 'static;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}

/// Runs `body` inside one transaction.
///
/// Commits when `body` returns `Ok`; otherwise rolls back and returns the
/// error `body` produced, unchanged.
pub async fn with_transaction<B, T, F>(boundary: &B, body: F) -> StoreResult<T>
where
    B: TransactionBoundary + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut B::Tx) -> BoxFuture<'t, StoreResult<T>> + Send,
{
    let mut tx = boundary.begin().await?;
    let txn_id = tx.id();

    match body(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                event!(
                    Level::ERROR,
                    txn_id = %txn_id,
                    error = %rollback_err,
                    "transaction rollback failed"
                );
            }
            Err(err)
        }
    }
}
