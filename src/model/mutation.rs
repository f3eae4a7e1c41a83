//! Partial-update descriptors applied inside a batch.
//!
//! Each record names its target row by primary key and carries only the fields
//! to change. `None` means "leave as is".

use crate::core::{ActorId, HandId, SeatNo, TableId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Update for a nullable column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assign<T> {
    Set(T),
    Clear,
}

impl<T: Clone> Assign<T> {
    pub fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Assign::Set(value) => *slot = Some(value.clone()),
            Assign::Clear => *slot = None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    #[default]
    Waiting,
    Playing,
    Paused,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    #[default]
    Empty,
    Active,
    SittingOut,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    #[default]
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandStatus {
    #[default]
    InProgress,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    BuyIn,
    CashOut,
    Blind,
    Bet,
    PotAward,
    Rake,
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMutation {
    pub table_id: TableId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TableStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_seat: Option<SeatNo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hand: Option<Assign<HandId>>,
}

impl TableMutation {
    pub fn new(table_id: impl Into<TableId>) -> Self {
        Self {
            table_id: table_id.into(),
            status: None,
            button_seat: None,
            current_hand: None,
        }
    }

    pub fn with_status(mut self, status: TableStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_button_seat(mut self, seat_no: SeatNo) -> Self {
        self.button_seat = Some(seat_no);
        self
    }

    pub fn with_current_hand(mut self, hand_id: impl Into<HandId>) -> Self {
        self.current_hand = Some(Assign::Set(hand_id.into()));
        self
    }

    pub fn clear_current_hand(mut self) -> Self {
        self.current_hand = Some(Assign::Clear);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMutation {
    pub table_id: TableId,
    pub seat_no: SeatNo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupant: Option<Assign<ActorId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SeatStatus>,
}

impl SeatMutation {
    pub fn new(table_id: impl Into<TableId>, seat_no: SeatNo) -> Self {
        Self {
            table_id: table_id.into(),
            seat_no,
            occupant: None,
            stack: None,
            status: None,
        }
    }

    pub fn with_occupant(mut self, actor_id: impl Into<ActorId>) -> Self {
        self.occupant = Some(Assign::Set(actor_id.into()));
        self
    }

    pub fn vacate(mut self) -> Self {
        self.occupant = Some(Assign::Clear);
        self
    }

    pub fn with_stack(mut self, stack: i64) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn with_status(mut self, status: SeatStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandMutation {
    pub hand_id: HandId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<Street>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pot: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<HandStatus>,
}

impl HandMutation {
    pub fn new(hand_id: impl Into<HandId>) -> Self {
        Self {
            hand_id: hand_id.into(),
            street: None,
            pot: None,
            board: None,
            status: None,
        }
    }

    pub fn with_street(mut self, street: Street) -> Self {
        self.street = Some(street);
        self
    }

    pub fn with_pot(mut self, pot: i64) -> Self {
        self.pot = Some(pot);
        self
    }

    pub fn with_board(mut self, board: Vec<String>) -> Self {
        self.board = Some(board);
        self
    }

    pub fn with_status(mut self, status: HandStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Per-player hand state. Creates the row if it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandPlayerUpsert {
    pub hand_id: HandId,
    pub actor_id: ActorId,
    pub seat_no: SeatNo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<Vec<String>>,
}

impl HandPlayerUpsert {
    pub fn new(hand_id: impl Into<HandId>, actor_id: impl Into<ActorId>, seat_no: SeatNo) -> Self {
        Self {
            hand_id: hand_id.into(),
            actor_id: actor_id.into(),
            seat_no,
            committed: None,
            folded: None,
            hole_cards: None,
        }
    }

    pub fn with_committed(mut self, committed: i64) -> Self {
        self.committed = Some(committed);
        self
    }

    pub fn with_folded(mut self, folded: bool) -> Self {
        self.folded = Some(folded);
        self
    }

    pub fn with_hole_cards(mut self, cards: Vec<String>) -> Self {
        self.hole_cards = Some(cards);
        self
    }
}

/// Append-only money movement. Positive amounts credit the actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub transaction_id: Uuid,
    pub actor_id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_id: Option<HandId>,
    pub amount: i64,
    pub reason: LedgerReason,
}

impl WalletTransaction {
    pub fn new(actor_id: impl Into<ActorId>, amount: i64, reason: LedgerReason) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            actor_id: actor_id.into(),
            table_id: None,
            hand_id: None,
            amount,
            reason,
        }
    }

    pub fn at_table(mut self, table_id: impl Into<TableId>) -> Self {
        self.table_id = Some(table_id.into());
        self
    }

    pub fn in_hand(mut self, hand_id: impl Into<HandId>) -> Self {
        self.hand_id = Some(hand_id.into());
        self
    }
}
