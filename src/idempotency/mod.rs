// ============================================================================
// Idempotency
// ============================================================================
//
// Classifies inbound commands as novel or duplicate by
// (actor, table-or-none, client request id) inside a fixed TTL window.
// The cache is constructed and owned explicitly; there is no global instance.
//
// Entries live in process memory only. A restart, or another process, does
// not see request ids accepted earlier.
//
// ============================================================================

pub mod cache;
pub mod clock;

pub use cache::{AdmissionTicket, IdempotencyCache, IdempotencyScope};
pub use clock::{Clock, ManualClock, MonotonicClock};
