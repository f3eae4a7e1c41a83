use crate::core::{ActorId, TableId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Who is asking, and at which table (if any).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyScope {
    pub actor_id: ActorId,
    pub table_id: Option<TableId>,
}

impl IdempotencyScope {
    pub fn new(actor_id: impl Into<ActorId>, table_id: Option<TableId>) -> Self {
        Self {
            actor_id: actor_id.into(),
            table_id,
        }
    }

    /// Scope for commands not tied to a table (lobby, wallet).
    pub fn actor(actor_id: impl Into<ActorId>) -> Self {
        Self::new(actor_id, None)
    }

    pub fn at_table(actor_id: impl Into<ActorId>, table_id: impl Into<TableId>) -> Self {
        Self::new(actor_id, Some(table_id.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IdempotencyKey {
    scope: IdempotencyScope,
    request_id: String,
}

impl IdempotencyKey {
    fn new(scope: &IdempotencyScope, request_id: &str) -> Self {
        Self {
            scope: scope.clone(),
            request_id: request_id.to_string(),
        }
    }
}

/// Proof of one admission, handed out by [`IdempotencyCache::admit`].
///
/// Releasing with a ticket only removes the entry that admission created; a
/// later admission of the same key is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionTicket {
    generation: u64,
    expiry: Timestamp,
}

impl AdmissionTicket {
    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    expiry: Timestamp,
    generation: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<IdempotencyKey, Entry>,
    // One slot per live entry, ordered by expiry regardless of the order
    // callers reached the lock in.
    by_expiry: BTreeMap<(Timestamp, u64), IdempotencyKey>,
    next_generation: u64,
}

impl CacheState {
    fn prune(&mut self, now: Timestamp) {
        while let Some(entry) = self.by_expiry.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let key = entry.remove();
            self.entries.remove(&key);
        }
    }

    fn insert(&mut self, key: IdempotencyKey, expiry: Timestamp) -> AdmissionTicket {
        let generation = self.next_generation;
        self.next_generation += 1;

        if let Some(previous) = self.entries.insert(key.clone(), Entry { expiry, generation }) {
            self.by_expiry.remove(&(previous.expiry, previous.generation));
        }
        self.by_expiry.insert((expiry, generation), key);
        AdmissionTicket { generation, expiry }
    }

    fn remove_if(&mut self, key: &IdempotencyKey, ticket: &AdmissionTicket) -> bool {
        match self.entries.get(key).copied() {
            Some(entry) if entry.generation == ticket.generation => {
                self.by_expiry.remove(&(entry.expiry, entry.generation));
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }
}

/// Recognizes retried commands within a fixed time window.
///
/// Purely in-memory and per-process: a restart forgets every entry.
#[derive(Debug)]
pub struct IdempotencyCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` if `(scope, request_id)` was already accepted and is still
    /// inside its window, `false` if it is novel (and records it).
    ///
    /// Check and insert happen under one lock, so two racing callers with the
    /// same key never both see `false`.
    pub fn check(&self, scope: &IdempotencyScope, request_id: &str, now: Timestamp) -> bool {
        self.admit(scope, request_id, now).is_none()
    }

    /// Same classification as [`check`](Self::check). A novel key yields the
    /// ticket for its new entry; a duplicate yields `None`.
    pub fn admit(
        &self,
        scope: &IdempotencyScope,
        request_id: &str,
        now: Timestamp,
    ) -> Option<AdmissionTicket> {
        let mut state = self.lock();
        state.prune(now);

        let key = IdempotencyKey::new(scope, request_id);
        if let Some(entry) = state.entries.get(&key) {
            if entry.expiry > now {
                return None;
            }
        }

        let expiry = now.saturating_add(self.ttl);
        Some(state.insert(key, expiry))
    }

    /// Drops the entry `ticket` admitted, so the next check for the key is
    /// novel again. A newer admission of the same key is kept.
    ///
    /// Returns whether an entry was removed.
    pub fn release(
        &self,
        scope: &IdempotencyScope,
        request_id: &str,
        ticket: &AdmissionTicket,
    ) -> bool {
        let key = IdempotencyKey::new(scope, request_id);
        self.lock().remove_if(&key, ticket)
    }

    /// Entries currently held, including expired ones not yet pruned.
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    // Every mutation leaves the map consistent, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_duplicate_inside_window() {
        let cache = IdempotencyCache::new(Duration::from_millis(10_000));
        let scope = IdempotencyScope::at_table("U1", "T1");

        assert!(!cache.check(&scope, "req-1", at(0)));
        assert!(cache.check(&scope, "req-1", at(1)));
        assert!(cache.check(&scope, "req-1", at(9_999)));
        assert!(!cache.check(&scope, "req-1", at(10_000)));
    }

    #[test]
    fn test_duplicate_does_not_extend_window() {
        let cache = IdempotencyCache::new(Duration::from_millis(100));
        let scope = IdempotencyScope::actor("U1");

        assert!(!cache.check(&scope, "req-1", at(0)));
        assert!(cache.check(&scope, "req-1", at(50)));
        assert!(cache.check(&scope, "req-1", at(99)));
        assert!(!cache.check(&scope, "req-1", at(101)));
        // Fresh window from 101.
        assert!(cache.check(&scope, "req-1", at(200)));
        assert!(!cache.check(&scope, "req-1", at(201)));
    }

    #[test]
    fn test_pruning_is_lazy() {
        let cache = IdempotencyCache::new(Duration::from_millis(10));
        let scope = IdempotencyScope::actor("U1");

        for i in 0..5 {
            cache.check(&scope, &format!("req-{i}"), at(0));
        }
        assert_eq!(cache.size(), 5);

        // Nothing has walked the entries yet.
        assert_eq!(cache.size(), 5);

        cache.check(&scope, "req-late", at(10));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_release_drops_only_its_own_admission() {
        let cache = IdempotencyCache::new(Duration::from_millis(100));
        let scope = IdempotencyScope::actor("U1");

        let first = cache.admit(&scope, "req-1", at(0)).unwrap();
        // First window lapses while its attempt is still running; a retry is admitted.
        let second = cache.admit(&scope, "req-1", at(100)).unwrap();
        assert_eq!(second.expiry(), at(200));

        assert!(!cache.release(&scope, "req-1", &first));
        assert!(cache.check(&scope, "req-1", at(150)));

        assert!(cache.release(&scope, "req-1", &second));
        assert_eq!(cache.size(), 0);
        assert!(!cache.check(&scope, "req-1", at(160)));
    }

    #[test]
    fn test_prune_handles_out_of_order_now() {
        let cache = IdempotencyCache::new(Duration::from_millis(10));
        let scope = IdempotencyScope::actor("U1");

        assert!(!cache.check(&scope, "a", at(5)));
        assert!(!cache.check(&scope, "b", at(4)));
        assert_eq!(cache.size(), 2);

        // b expires at 14, a at 15.
        assert!(!cache.check(&scope, "c", at(14)));
        assert_eq!(cache.size(), 2);
        assert!(cache.check(&scope, "a", at(14)));
        assert!(!cache.check(&scope, "b", at(14)));
    }

    #[test]
    fn test_released_key_is_novel_again() {
        let cache = IdempotencyCache::new(Duration::from_millis(10));
        let scope = IdempotencyScope::actor("U1");

        let ticket = cache.admit(&scope, "req-1", at(0)).unwrap();
        assert!(cache.release(&scope, "req-1", &ticket));
        assert!(!cache.check(&scope, "req-1", at(5)));

        // The released entry left nothing behind that could evict the t=5 one.
        assert!(cache.check(&scope, "req-1", at(12)));
        assert!(!cache.check(&scope, "req-1", at(15)));
    }

    #[test]
    fn test_separator_characters_do_not_collide() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let a = IdempotencyScope::at_table("U1:T1", "x");
        let b = IdempotencyScope::at_table("U1", "T1:x");

        assert!(!cache.check(&a, "r", at(0)));
        assert!(!cache.check(&b, "r", at(0)));
    }

    #[test]
    fn test_release_after_expiry_is_a_no_op() {
        let cache = IdempotencyCache::new(Duration::from_millis(10));
        let scope = IdempotencyScope::actor("U1");

        let ticket = cache.admit(&scope, "req-1", at(0)).unwrap();
        assert!(!cache.check(&scope, "other", at(20)));
        assert!(!cache.release(&scope, "req-1", &ticket));
        assert!(!cache.release(&IdempotencyScope::actor("U2"), "never-seen", &ticket));
    }
}
