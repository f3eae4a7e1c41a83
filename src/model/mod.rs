// ============================================================================
// Command Data Model
// ============================================================================
//
// What the rules engine hands over per accepted command: one event record
// plus the row-level mutations that go with it.
//
// ============================================================================

pub mod batch;
pub mod event;
pub mod mutation;

pub use batch::{CommandBatch, CommandBatchBuilder, CommandBatchDraft};
pub use event::{EventKind, EventRecord, EventVocabulary, VOCABULARY_LATEST, VOCABULARY_V1};
pub use mutation::{
    Assign, HandMutation, HandPlayerUpsert, HandStatus, LedgerReason, SeatMutation, SeatStatus,
    Street, TableMutation, TableStatus, WalletTransaction,
};
