// ============================================================================
// Storage
// ============================================================================
//
// In-memory implementation of the transaction boundary. All event ordering
// and referential invariants are enforced here.
//
// ============================================================================

pub mod memory;
pub mod rows;

pub use memory::{InMemoryGameStore, MemoryTransaction};
pub use rows::{HandPlayerRow, HandRow, SeatRow, TableRow};
