use super::rows::{HandPlayerRow, HandRow, SeatRow, StoreState, TableRow};
use crate::config::PipelineConfig;
use crate::core::{ActorId, ConfigError, HandId, SeatNo, StoreError, StoreResult, TableId};
use crate::model::{
    EventRecord, EventVocabulary, HandMutation, HandPlayerUpsert, SeatMutation, TableMutation,
    WalletTransaction,
};
use crate::transaction::{
    Change, Transaction, TransactionBoundary, TransactionHandle, TransactionId,
    TransactionManager, TransactionStats, TxOperation,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{Level, event};

/// One-shot failures armed by tests.
#[derive(Debug, Default)]
struct FaultInjector {
    pending: StdMutex<Vec<TxOperation>>,
}

impl FaultInjector {
    fn arm(&self, operation: TxOperation) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }

    fn trip(&self, operation: TxOperation) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.iter().position(|armed| *armed == operation) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }
}

/// In-process transaction boundary over persistent collections.
///
/// A transaction holds the store lock from `begin` until it commits or rolls
/// back, so commits are fully serialized and the sequence checks always see
/// the latest committed state. Reads wait for the open transaction to finish.
///
/// Clones share the same underlying store.
#[derive(Debug, Clone)]
pub struct InMemoryGameStore {
    state: Arc<Mutex<StoreState>>,
    vocabulary: Arc<EventVocabulary>,
    manager: Arc<TransactionManager>,
    faults: Arc<FaultInjector>,
}

impl Default for InMemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::with_vocabulary(EventVocabulary::v1())
    }

    pub fn with_vocabulary(vocabulary: EventVocabulary) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            vocabulary: Arc::new(vocabulary),
            manager: Arc::new(TransactionManager::new()),
            faults: Arc::new(FaultInjector::default()),
        }
    }

    /// Store accepting the vocabulary version named in `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let vocabulary = EventVocabulary::for_version(config.vocabulary_version).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unknown vocabulary version {}",
                config.vocabulary_version
            ))
        })?;
        Ok(Self::with_vocabulary(vocabulary))
    }

    pub fn vocabulary(&self) -> &EventVocabulary {
        &self.vocabulary
    }

    /// Creates a table with seats numbered `1..=seat_count`.
    pub async fn open_table(&self, table_id: impl Into<TableId>, seat_count: SeatNo) -> StoreResult<()> {
        let table_id = table_id.into();
        self.state.lock().await.open_table(table_id.clone(), seat_count)?;
        event!(Level::DEBUG, table_id = %table_id, seat_count, "table opened");
        Ok(())
    }

    /// Binds a new hand to an existing table.
    pub async fn open_hand(
        &self,
        hand_id: impl Into<HandId>,
        table_id: impl Into<TableId>,
    ) -> StoreResult<()> {
        let hand_id = hand_id.into();
        let table_id = table_id.into();
        self.state
            .lock()
            .await
            .open_hand(hand_id.clone(), table_id.clone())?;
        event!(Level::DEBUG, hand_id = %hand_id, table_id = %table_id, "hand opened");
        Ok(())
    }

    pub async fn table(&self, table_id: &TableId) -> Option<TableRow> {
        self.state.lock().await.tables.get(table_id).cloned()
    }

    pub async fn seat(&self, table_id: &TableId, seat_no: SeatNo) -> Option<SeatRow> {
        self.state
            .lock()
            .await
            .seats
            .get(&(table_id.clone(), seat_no))
            .cloned()
    }

    pub async fn hand(&self, hand_id: &HandId) -> Option<HandRow> {
        self.state.lock().await.hands.get(hand_id).cloned()
    }

    pub async fn hand_player(&self, hand_id: &HandId, actor_id: &ActorId) -> Option<HandPlayerRow> {
        self.state
            .lock()
            .await
            .hand_players
            .get(&(hand_id.clone(), actor_id.clone()))
            .cloned()
    }

    /// Committed events of a table, in table-sequence order.
    pub async fn events_for_table(&self, table_id: &TableId) -> Vec<EventRecord> {
        let mut events = self
            .state
            .lock()
            .await
            .events
            .iter()
            .filter(|event| &event.table_id == table_id)
            .cloned()
            .collect::<Vec<_>>();
        events.sort_by_key(|event| event.table_seq);
        events
    }

    /// Committed events of a hand, in hand-sequence order.
    pub async fn events_for_hand(&self, hand_id: &HandId) -> Vec<EventRecord> {
        let mut events = self
            .state
            .lock()
            .await
            .events
            .iter()
            .filter(|event| &event.hand_id == hand_id)
            .cloned()
            .collect::<Vec<_>>();
        events.sort_by_key(|event| event.hand_seq);
        events
    }

    pub async fn event_count(&self) -> usize {
        self.state.lock().await.events.len()
    }

    pub async fn ledger_for_actor(&self, actor_id: &ActorId) -> Vec<WalletTransaction> {
        self.state
            .lock()
            .await
            .ledger
            .iter()
            .filter(|entry| &entry.actor_id == actor_id)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> TransactionStats {
        self.manager.stats()
    }

    /// Makes the next call of `operation`, in any transaction, fail with
    /// [`StoreError::Transient`].
    pub fn inject_fault(&self, operation: TxOperation) {
        self.faults.arm(operation);
    }
}

#[async_trait]
impl TransactionBoundary for InMemoryGameStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> StoreResult<MemoryTransaction> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        let txn_id = self.manager.begin();
        event!(Level::DEBUG, txn_id = %txn_id, "transaction begun");

        Ok(MemoryTransaction {
            txn: Transaction::new(txn_id),
            guard: Some(guard),
            working,
            failed: false,
            vocabulary: Arc::clone(&self.vocabulary),
            manager: Arc::clone(&self.manager),
            faults: Arc::clone(&self.faults),
        })
    }
}

/// Handle for one in-memory transaction.
///
/// Writes go to a private copy of the store state that replaces the shared
/// state on commit. After any failed operation the handle only accepts
/// rollback.
pub struct MemoryTransaction {
    txn: Transaction,
    guard: Option<OwnedMutexGuard<StoreState>>,
    working: StoreState,
    failed: bool,
    vocabulary: Arc<EventVocabulary>,
    manager: Arc<TransactionManager>,
    faults: Arc<FaultInjector>,
}

impl MemoryTransaction {
    /// Changes staged so far.
    pub fn changes(&self) -> &[Change] {
        self.txn.changes()
    }

    fn before(&mut self, operation: TxOperation) -> StoreResult<()> {
        self.txn.ensure_active()?;
        if self.failed {
            return Err(StoreError::TransactionState(format!(
                "transaction {} already failed; {} refused",
                self.txn.id(),
                operation
            )));
        }
        if self.faults.trip(operation) {
            self.failed = true;
            return Err(StoreError::Transient(format!(
                "injected fault on {operation}"
            )));
        }
        Ok(())
    }

    fn track<T>(&mut self, result: StoreResult<T>) -> StoreResult<T> {
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn abort(&mut self, reason: &str) {
        let txn_id = self.txn.id();
        let discarded = self.txn.change_count();
        if self.txn.rollback().is_ok() {
            self.manager.rollback(txn_id);
        }
        self.guard.take();
        event!(Level::WARN, txn_id = %txn_id, discarded, reason, "transaction rolled back");
    }
}

#[async_trait]
impl TransactionHandle for MemoryTransaction {
    fn id(&self) -> TransactionId {
        self.txn.id()
    }

    async fn append_event(&mut self, event: &EventRecord) -> StoreResult<()> {
        self.before(TxOperation::AppendEvent)?;
        let result = self.working.append_event(event, &self.vocabulary);
        self.track(result)?;
        self.txn.record_change(Change::AppendEvent {
            table_id: event.table_id.clone(),
            hand_id: event.hand_id.clone(),
            table_seq: event.table_seq,
            hand_seq: event.hand_seq,
            kind: event.kind.clone(),
        })
    }

    async fn update_table(&mut self, mutation: &TableMutation) -> StoreResult<()> {
        self.before(TxOperation::UpdateTable)?;
        let result = self.working.update_table(mutation);
        self.track(result)?;
        self.txn.record_change(Change::UpdateTable {
            table_id: mutation.table_id.clone(),
        })
    }

    async fn update_seats(&mut self, mutations: &[SeatMutation]) -> StoreResult<()> {
        self.before(TxOperation::UpdateSeats)?;
        for mutation in mutations {
            let result = self.working.update_seat(mutation);
            self.track(result)?;
            self.txn.record_change(Change::UpdateSeat {
                table_id: mutation.table_id.clone(),
                seat_no: mutation.seat_no,
            })?;
        }
        Ok(())
    }

    async fn update_hand(&mut self, mutation: &HandMutation) -> StoreResult<()> {
        self.before(TxOperation::UpdateHand)?;
        let result = self.working.update_hand(mutation);
        self.track(result)?;
        self.txn.record_change(Change::UpdateHand {
            hand_id: mutation.hand_id.clone(),
        })
    }

    async fn upsert_hand_players(&mut self, upserts: &[HandPlayerUpsert]) -> StoreResult<()> {
        self.before(TxOperation::UpsertHandPlayers)?;
        for upsert in upserts {
            let result = self.working.upsert_hand_player(upsert);
            let created = self.track(result)?;
            self.txn.record_change(Change::UpsertHandPlayer {
                hand_id: upsert.hand_id.clone(),
                actor_id: upsert.actor_id.clone(),
                created,
            })?;
        }
        Ok(())
    }

    async fn append_wallet_transactions(
        &mut self,
        entries: &[WalletTransaction],
    ) -> StoreResult<()> {
        self.before(TxOperation::AppendWalletTransactions)?;
        for entry in entries {
            let result = self.working.append_wallet_transaction(entry);
            self.track(result)?;
            self.txn.record_change(Change::AppendWalletTransaction {
                transaction_id: entry.transaction_id,
                actor_id: entry.actor_id.clone(),
                amount: entry.amount,
            })?;
        }
        Ok(())
    }

    async fn commit(mut self) -> StoreResult<()> {
        self.txn.ensure_active()?;
        if self.failed {
            self.abort("commit after failed operation");
            return Err(StoreError::TransactionState(format!(
                "transaction {} cannot commit after a failed operation",
                self.txn.id()
            )));
        }
        if self.faults.trip(TxOperation::Commit) {
            self.abort("injected commit fault");
            return Err(StoreError::Transient("injected fault on commit".to_string()));
        }

        let txn_id = self.txn.id();
        let changes = self.txn.change_count();
        let elapsed_us = u64::try_from(self.txn.duration().as_micros()).unwrap_or(u64::MAX);
        self.txn.commit()?;
        if let Some(mut guard) = self.guard.take() {
            *guard = std::mem::take(&mut self.working);
        }
        let version = self.manager.commit(txn_id);
        event!(
            Level::DEBUG,
            txn_id = %txn_id,
            changes,
            version,
            elapsed_us,
            "transaction committed"
        );
        Ok(())
    }

    async fn rollback(mut self) -> StoreResult<()> {
        self.txn.ensure_active()?;
        self.abort("rollback requested");
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.txn.state().is_active() {
            self.abort("handle dropped before commit");
        }
    }
}
