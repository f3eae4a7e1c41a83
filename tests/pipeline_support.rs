#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tablecommit::storage::MemoryTransaction;
use tablecommit::{
    EventKind, EventPublisher, EventRecord, HandMutation, HandPlayerUpsert, InMemoryGameStore,
    PublishError, SeatMutation, StoreResult, TableMutation, TransactionBoundary,
    TransactionHandle, TransactionId, TxOperation, WalletTransaction,
};
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// T1 and T2 with six seats each; H1 bound to T1, H2 bound to T2.
pub async fn seeded_store() -> InMemoryGameStore {
    let store = InMemoryGameStore::new();
    store.open_table("T1", 6).await.unwrap();
    store.open_table("T2", 6).await.unwrap();
    store.open_hand("H1", "T1").await.unwrap();
    store.open_hand("H2", "T2").await.unwrap();
    store
}

pub fn bet_event(table: &str, hand: &str, table_seq: u64, hand_seq: u64) -> EventRecord {
    EventRecord::new(
        table,
        hand,
        table_seq,
        hand_seq,
        EventKind::PlayerBet,
        json!({ "amount": 20 }),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Begin,
    Op(TxOperation),
    Rollback,
    Publish(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct StepLog(Arc<Mutex<Vec<Step>>>);

impl StepLog {
    pub fn push(&self, step: Step) {
        self.0.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Step) -> usize {
        self.steps().iter().filter(|step| *step == wanted).count()
    }

    pub fn publish_count(&self) -> usize {
        self.steps()
            .iter()
            .filter(|step| matches!(step, Step::Publish(_)))
            .count()
    }
}

/// Wraps the in-memory store and records every boundary call.
pub struct RecordingBoundary {
    pub inner: InMemoryGameStore,
    pub log: StepLog,
}

impl RecordingBoundary {
    pub fn new(inner: InMemoryGameStore, log: StepLog) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl TransactionBoundary for RecordingBoundary {
    type Tx = RecordingTx;

    async fn begin(&self) -> StoreResult<RecordingTx> {
        self.log.push(Step::Begin);
        Ok(RecordingTx {
            inner: self.inner.begin().await?,
            log: self.log.clone(),
        })
    }
}

pub struct RecordingTx {
    inner: MemoryTransaction,
    log: StepLog,
}

#[async_trait]
impl TransactionHandle for RecordingTx {
    fn id(&self) -> TransactionId {
        self.inner.id()
    }

    async fn append_event(&mut self, event: &EventRecord) -> StoreResult<()> {
        self.log.push(Step::Op(TxOperation::AppendEvent));
        self.inner.append_event(event).await
    }

    async fn update_table(&mut self, mutation: &TableMutation) -> StoreResult<()> {
        self.log.push(Step::Op(TxOperation::UpdateTable));
        self.inner.update_table(mutation).await
    }

    async fn update_seats(&mut self, mutations: &[SeatMutation]) -> StoreResult<()> {
        self.log.push(Step::Op(TxOperation::UpdateSeats));
        self.inner.update_seats(mutations).await
    }

    async fn update_hand(&mut self, mutation: &HandMutation) -> StoreResult<()> {
        self.log.push(Step::Op(TxOperation::UpdateHand));
        self.inner.update_hand(mutation).await
    }

    async fn upsert_hand_players(&mut self, upserts: &[HandPlayerUpsert]) -> StoreResult<()> {
        self.log.push(Step::Op(TxOperation::UpsertHandPlayers));
        self.inner.upsert_hand_players(upserts).await
    }

    async fn append_wallet_transactions(
        &mut self,
        entries: &[WalletTransaction],
    ) -> StoreResult<()> {
        self.log.push(Step::Op(TxOperation::AppendWalletTransactions));
        self.inner.append_wallet_transactions(entries).await
    }

    async fn commit(self) -> StoreResult<()> {
        self.log.push(Step::Op(TxOperation::Commit));
        self.inner.commit().await
    }

    async fn rollback(self) -> StoreResult<()> {
        self.log.push(Step::Rollback);
        self.inner.rollback().await
    }
}

/// Records publishes into the shared log; can be told to fail or stall.
#[derive(Default)]
pub struct RecordingPublisher {
    log: StepLog,
    failure: Mutex<Option<PublishError>>,
    delay: Mutex<Option<Duration>>,
    published: Mutex<Vec<EventRecord>>,
}

impl RecordingPublisher {
    pub fn new(log: StepLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn fail_with(&self, err: PublishError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn stall_for(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn published(&self) -> Vec<EventRecord> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &EventRecord) -> Result<(), PublishError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.log.push(Step::Publish(event.event_id));
        let failure = self.failure.lock().unwrap().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }
}
