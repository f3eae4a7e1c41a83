// ============================================================================
// tablecommit
// ============================================================================
//
// Command commit-and-publish pipeline for a multi-seat table game server.
//
//   inbound command
//       │
//       ▼
//   IdempotencyCache::check ── duplicate ──> SubmitOutcome::Duplicate
//       │ novel
//       ▼
//   CommandPipeline::commit_and_publish
//       ├─► TransactionBoundary: event, table, seats, hand, players, wallet
//       │        └─ any failure: rollback, nothing published
//       └─► EventPublisher::publish   (only after commit)
//
// ============================================================================

pub mod config;
pub mod core;
pub mod idempotency;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod storage;
pub mod transaction;

pub use config::PipelineConfig;
pub use core::{
    ActorId, BatchError, CommitError, ConfigError, HandId, InvariantViolation, PublishError,
    SeatNo, StoreError, StoreResult, SubmitError, TableId, Timestamp,
};
pub use idempotency::{
    AdmissionTicket, Clock, IdempotencyCache, IdempotencyScope, ManualClock, MonotonicClock,
};
pub use model::{
    CommandBatch, EventKind, EventRecord, EventVocabulary, HandMutation, HandPlayerUpsert,
    SeatMutation, TableMutation, WalletTransaction,
};
pub use pipeline::{CommandGateway, CommandPipeline, CommitReceipt, SubmitOutcome};
pub use publish::{BroadcastPublisher, EventPublisher};
pub use storage::InMemoryGameStore;
pub use transaction::{
    TransactionBoundary, TransactionHandle, TransactionId, TransactionStats, TxOperation,
    with_transaction,
};
