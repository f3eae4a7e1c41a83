// ============================================================================
// Transaction Boundary
// ============================================================================
//
// The contract between the commit pipeline and a persistence backend:
// begin a transaction, apply the six batch operations in order, then commit
// everything or nothing.
//
// Production and in-memory backends are interchangeable implementations of
// `TransactionBoundary`; neither derives from the other.
//
// ============================================================================

pub mod boundary;
pub mod change;
pub mod manager;
pub mod state;

pub use boundary::{TransactionBoundary, TransactionHandle, TxOperation, with_transaction};
pub use change::Change;
pub use manager::{TransactionManager, TransactionStats};
pub use state::{Transaction, TransactionId, TransactionState};
