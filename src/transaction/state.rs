// ============================================================================
// Transaction State Management
// ============================================================================
//
// Lifecycle of one batch transaction: Active -> Committed | Aborted.
// The transaction keeps a journal of the changes it staged, in the order
// they were applied, for diagnostics and tracing.
//
// ============================================================================

use super::Change;
use crate::core::{StoreError, StoreResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static TXN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-wide, strictly increasing transaction number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new() -> Self {
        Self(TXN_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping for one open transaction. Holds no row data; the backend
/// stages rows itself and reports each applied change here.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    journal: Vec<Change>,
    opened_at: Instant,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            journal: Vec::new(),
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Changes staged so far, in application order.
    pub fn changes(&self) -> &[Change] {
        &self.journal
    }

    pub fn change_count(&self) -> usize {
        self.journal.len()
    }

    pub fn duration(&self) -> Duration {
        self.opened_at.elapsed()
    }

    pub fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            state => Err(StoreError::TransactionState(format!(
                "transaction {} is {state}",
                self.id
            ))),
        }
    }

    pub fn record_change(&mut self, change: Change) -> StoreResult<()> {
        self.ensure_active()?;
        self.journal.push(change);
        Ok(())
    }

    pub fn commit(&mut self) -> StoreResult<()> {
        self.finish(TransactionState::Committed)
    }

    /// Marks the transaction aborted and drops its journal.
    pub fn rollback(&mut self) -> StoreResult<()> {
        self.finish(TransactionState::Aborted)?;
        self.journal.clear();
        Ok(())
    }

    fn finish(&mut self, target: TransactionState) -> StoreResult<()> {
        if self.state.is_terminal() {
            return Err(StoreError::TransactionState(format!(
                "{} cannot move to {target}: already {}",
                self.id, self.state
            )));
        }
        self.state = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TableId;

    fn seat_change(seat_no: u8) -> Change {
        Change::UpdateSeat {
            table_id: TableId::new("T1"),
            seat_no,
        }
    }

    #[test]
    fn test_ids_increase() {
        let first = TransactionId::new();
        let second = TransactionId::new();
        assert!(second > first);
        assert_eq!(first.to_string(), format!("txn_{}", first.as_u64()));
    }

    #[test]
    fn test_commit_keeps_journal() {
        let mut txn = Transaction::new(TransactionId::new());
        txn.record_change(seat_change(1)).unwrap();
        txn.record_change(seat_change(2)).unwrap();

        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(txn.changes(), &[seat_change(1), seat_change(2)]);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut committed = Transaction::new(TransactionId::new());
        committed.commit().unwrap();
        assert!(committed.commit().is_err());
        assert!(committed.rollback().is_err());

        let mut aborted = Transaction::new(TransactionId::new());
        aborted.rollback().unwrap();
        assert!(matches!(
            aborted.commit(),
            Err(StoreError::TransactionState(_))
        ));
    }

    #[test]
    fn test_rollback_drops_journal() {
        let mut txn = Transaction::new(TransactionId::new());
        txn.record_change(seat_change(4)).unwrap();

        txn.rollback().unwrap();
        assert_eq!(txn.change_count(), 0);
        assert!(txn.state().is_terminal());
        assert!(txn.record_change(seat_change(5)).is_err());
    }
}
