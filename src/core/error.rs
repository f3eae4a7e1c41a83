use thiserror::Error;

use super::types::{HandId, TableId};
use crate::pipeline::CommitReceipt;

/// Event and row invariants owned by the persistence backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Table '{table_id}' already has an event with table sequence {table_seq}")]
    DuplicateTableSequence { table_id: TableId, table_seq: u64 },

    #[error("Table sequence {table_seq} for table '{table_id}' is not after {last_seq}")]
    TableSequenceOutOfOrder {
        table_id: TableId,
        table_seq: u64,
        last_seq: u64,
    },

    #[error("Hand '{hand_id}' already has an event with hand sequence {hand_seq}")]
    DuplicateHandSequence { hand_id: HandId, hand_seq: u64 },

    #[error("Hand sequence {hand_seq} for hand '{hand_id}' is not after {last_seq}")]
    HandSequenceOutOfOrder {
        hand_id: HandId,
        hand_seq: u64,
        last_seq: u64,
    },

    #[error("Hand '{hand_id}' is bound to table '{bound_table}', not '{claimed_table}'")]
    HandTableMismatch {
        hand_id: HandId,
        bound_table: TableId,
        claimed_table: TableId,
    },

    #[error("Hand '{0}' not found")]
    UnknownHand(HandId),

    #[error("Table '{0}' not found")]
    UnknownTable(TableId),

    #[error("Event kind '{kind}' is not part of vocabulary v{vocabulary_version}")]
    UnknownEventKind { kind: String, vocabulary_version: u32 },

    #[error("{entity} '{key}' not found")]
    MissingRow { entity: &'static str, key: String },

    #[error("{entity} '{key}' already exists")]
    DuplicateRow { entity: &'static str, key: String },

    #[error("Wallet transaction '{0}' was already recorded")]
    DuplicateLedgerEntry(uuid::Uuid),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Transient persistence failure: {0}")]
    Transient(String),

    #[error("Transaction error: {0}")]
    TransactionState(String),
}

impl StoreError {
    /// True for failures a caller may retry with the same request id.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn invariant(&self) -> Option<&InvariantViolation> {
        match self {
            Self::Invariant(violation) => Some(violation),
            _ => None,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Notification channel closed")]
    ChannelClosed,

    #[error("Publish rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Command batch has no event record")]
    MissingEvent,
}

/// Outcome of `commit_and_publish` when it does not fully succeed.
///
/// The two variants separate "nothing committed" from "committed, notification
/// uncertain".
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Batch not committed: {0}")]
    NotCommitted(#[source] StoreError),

    #[error("Batch committed in {} but publish failed: {source}", receipt.transaction_id)]
    PublishFailed {
        receipt: Box<CommitReceipt>,
        #[source]
        source: PublishError,
    },
}

impl CommitError {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::PublishFailed { .. })
    }

    pub fn receipt(&self) -> Option<&CommitReceipt> {
        match self {
            Self::PublishFailed { receipt, .. } => Some(receipt),
            Self::NotCommitted(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// The commit did not report back in time. It may or may not have landed.
    #[error("Commit outcome unresolved after {timeout_ms}ms")]
    Unresolved { timeout_ms: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
