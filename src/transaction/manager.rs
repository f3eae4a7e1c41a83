// ============================================================================
// Transaction Manager
// ============================================================================

use super::TransactionId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters over the lifetime of a boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub active: usize,
}

/// Tracks which transactions are open and how each one ended.
///
/// Bookkeeping is synchronous so a handle can record its own rollback from
/// `Drop`.
#[derive(Debug, Default)]
pub struct TransactionManager {
    active_ids: Mutex<HashSet<u64>>,
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    global_version: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> TransactionId {
        let transaction_id = TransactionId::new();
        self.active().insert(transaction_id.0);
        self.begun.fetch_add(1, Ordering::SeqCst);
        transaction_id
    }

    /// Marks `txn_id` committed and returns the new global version.
    pub fn commit(&self, txn_id: TransactionId) -> u64 {
        if !self.active().remove(&txn_id.0) {
            return self.global_version();
        }
        self.committed.fetch_add(1, Ordering::SeqCst);
        self.global_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn rollback(&self, txn_id: TransactionId) {
        if self.active().remove(&txn_id.0) {
            self.rolled_back.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn is_active(&self, txn_id: TransactionId) -> bool {
        self.active().contains(&txn_id.0)
    }

    /// Number of commits applied so far.
    pub fn global_version(&self) -> u64 {
        self.global_version.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            begun: self.begun.load(Ordering::SeqCst),
            committed: self.committed.load(Ordering::SeqCst),
            rolled_back: self.rolled_back.load(Ordering::SeqCst),
            active: self.active().len(),
        }
    }

    fn active(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.active_ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
