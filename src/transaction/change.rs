// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// One entry per row touched inside a transaction. Entries are staged while
// the batch runs and discarded wholesale on rollback.
//
// ============================================================================

use super::TxOperation;
use crate::core::{ActorId, HandId, SeatNo, TableId};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    AppendEvent {
        table_id: TableId,
        hand_id: HandId,
        table_seq: u64,
        hand_seq: u64,
        kind: String,
    },

    UpdateTable {
        table_id: TableId,
    },

    UpdateSeat {
        table_id: TableId,
        seat_no: SeatNo,
    },

    UpdateHand {
        hand_id: HandId,
    },

    UpsertHandPlayer {
        hand_id: HandId,
        actor_id: ActorId,
        created: bool,
    },

    AppendWalletTransaction {
        transaction_id: Uuid,
        actor_id: ActorId,
        amount: i64,
    },
}

impl Change {
    /// Boundary operation that produced this change.
    pub fn operation(&self) -> TxOperation {
        match self {
            Change::AppendEvent { .. } => TxOperation::AppendEvent,
            Change::UpdateTable { .. } => TxOperation::UpdateTable,
            Change::UpdateSeat { .. } => TxOperation::UpdateSeats,
            Change::UpdateHand { .. } => TxOperation::UpdateHand,
            Change::UpsertHandPlayer { .. } => TxOperation::UpsertHandPlayers,
            Change::AppendWalletTransaction { .. } => TxOperation::AppendWalletTransactions,
        }
    }

    /// Moves money; the last group applied in a batch.
    pub fn is_ledger(&self) -> bool {
        matches!(self, Change::AppendWalletTransaction { .. })
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Change::AppendEvent { .. })
    }
}
