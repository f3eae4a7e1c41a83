use crate::core::{ActorId, HandId, InvariantViolation, SeatNo, StoreResult, TableId};
use crate::model::{
    EventRecord, EventVocabulary, HandMutation, HandPlayerUpsert, HandStatus, SeatMutation,
    SeatStatus, Street, TableMutation, TableStatus, WalletTransaction,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub table_id: TableId,
    pub status: TableStatus,
    pub seat_count: SeatNo,
    pub button_seat: Option<SeatNo>,
    pub current_hand: Option<HandId>,
    pub last_table_seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRow {
    pub table_id: TableId,
    pub seat_no: SeatNo,
    pub occupant: Option<ActorId>,
    pub stack: i64,
    pub status: SeatStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandRow {
    pub hand_id: HandId,
    pub table_id: TableId,
    pub street: Street,
    pub pot: i64,
    pub board: Vec<String>,
    pub status: HandStatus,
    pub last_hand_seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandPlayerRow {
    pub hand_id: HandId,
    pub actor_id: ActorId,
    pub seat_no: SeatNo,
    pub committed: i64,
    pub folded: bool,
    pub hole_cards: Vec<String>,
}

/// Whole-store state. Persistent collections make `clone` O(1), which is what
/// lets a transaction stage its writes on a private copy.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub(crate) tables: im::HashMap<TableId, TableRow>,
    pub(crate) seats: im::HashMap<(TableId, SeatNo), SeatRow>,
    pub(crate) hands: im::HashMap<HandId, HandRow>,
    pub(crate) hand_players: im::HashMap<(HandId, ActorId), HandPlayerRow>,
    pub(crate) events: im::Vector<EventRecord>,
    table_seqs: im::HashSet<(TableId, u64)>,
    hand_seqs: im::HashSet<(HandId, u64)>,
    pub(crate) ledger: im::Vector<WalletTransaction>,
    ledger_ids: im::HashSet<Uuid>,
}

fn seat_key(table_id: &TableId, seat_no: SeatNo) -> String {
    format!("{table_id}#{seat_no}")
}

impl StoreState {
    pub(crate) fn open_table(&mut self, table_id: TableId, seat_count: SeatNo) -> StoreResult<()> {
        if self.tables.contains_key(&table_id) {
            return Err(InvariantViolation::DuplicateRow {
                entity: "table",
                key: table_id.to_string(),
            }
            .into());
        }

        for seat_no in 1..=seat_count {
            self.seats.insert(
                (table_id.clone(), seat_no),
                SeatRow {
                    table_id: table_id.clone(),
                    seat_no,
                    occupant: None,
                    stack: 0,
                    status: SeatStatus::Empty,
                },
            );
        }
        self.tables.insert(
            table_id.clone(),
            TableRow {
                table_id,
                status: TableStatus::Waiting,
                seat_count,
                button_seat: None,
                current_hand: None,
                last_table_seq: None,
            },
        );
        Ok(())
    }

    pub(crate) fn open_hand(&mut self, hand_id: HandId, table_id: TableId) -> StoreResult<()> {
        if !self.tables.contains_key(&table_id) {
            return Err(InvariantViolation::UnknownTable(table_id).into());
        }
        if self.hands.contains_key(&hand_id) {
            return Err(InvariantViolation::DuplicateRow {
                entity: "hand",
                key: hand_id.to_string(),
            }
            .into());
        }

        self.hands.insert(
            hand_id.clone(),
            HandRow {
                hand_id,
                table_id,
                street: Street::Preflop,
                pot: 0,
                board: Vec::new(),
                status: HandStatus::InProgress,
                last_hand_seq: None,
            },
        );
        Ok(())
    }

    /// Resolves `hand_id` and checks it is bound to `table_id`.
    fn bound_hand(&self, hand_id: &HandId, table_id: &TableId) -> StoreResult<&HandRow> {
        let hand = self
            .hands
            .get(hand_id)
            .ok_or_else(|| InvariantViolation::UnknownHand(hand_id.clone()))?;
        if &hand.table_id != table_id {
            return Err(InvariantViolation::HandTableMismatch {
                hand_id: hand_id.clone(),
                bound_table: hand.table_id.clone(),
                claimed_table: table_id.clone(),
            }
            .into());
        }
        Ok(hand)
    }

    pub(crate) fn append_event(
        &mut self,
        event: &EventRecord,
        vocabulary: &EventVocabulary,
    ) -> StoreResult<()> {
        vocabulary.check(&event.kind)?;

        let last_table_seq = self
            .tables
            .get(&event.table_id)
            .ok_or_else(|| InvariantViolation::UnknownTable(event.table_id.clone()))?
            .last_table_seq;
        let last_hand_seq = self.bound_hand(&event.hand_id, &event.table_id)?.last_hand_seq;

        if self
            .table_seqs
            .contains(&(event.table_id.clone(), event.table_seq))
        {
            return Err(InvariantViolation::DuplicateTableSequence {
                table_id: event.table_id.clone(),
                table_seq: event.table_seq,
            }
            .into());
        }
        if let Some(last_seq) = last_table_seq {
            if event.table_seq <= last_seq {
                return Err(InvariantViolation::TableSequenceOutOfOrder {
                    table_id: event.table_id.clone(),
                    table_seq: event.table_seq,
                    last_seq,
                }
                .into());
            }
        }

        if self
            .hand_seqs
            .contains(&(event.hand_id.clone(), event.hand_seq))
        {
            return Err(InvariantViolation::DuplicateHandSequence {
                hand_id: event.hand_id.clone(),
                hand_seq: event.hand_seq,
            }
            .into());
        }
        if let Some(last_seq) = last_hand_seq {
            if event.hand_seq <= last_seq {
                return Err(InvariantViolation::HandSequenceOutOfOrder {
                    hand_id: event.hand_id.clone(),
                    hand_seq: event.hand_seq,
                    last_seq,
                }
                .into());
            }
        }

        if let Some(table) = self.tables.get_mut(&event.table_id) {
            table.last_table_seq = Some(event.table_seq);
        }
        if let Some(hand) = self.hands.get_mut(&event.hand_id) {
            hand.last_hand_seq = Some(event.hand_seq);
        }
        self.table_seqs
            .insert((event.table_id.clone(), event.table_seq));
        self.hand_seqs.insert((event.hand_id.clone(), event.hand_seq));
        self.events.push_back(event.clone());
        Ok(())
    }

    pub(crate) fn update_table(&mut self, mutation: &TableMutation) -> StoreResult<()> {
        if let Some(crate::model::Assign::Set(hand_id)) = &mutation.current_hand {
            self.bound_hand(hand_id, &mutation.table_id)?;
        }

        let table = self
            .tables
            .get_mut(&mutation.table_id)
            .ok_or_else(|| InvariantViolation::MissingRow {
                entity: "table",
                key: mutation.table_id.to_string(),
            })?;
        if let Some(status) = mutation.status {
            table.status = status;
        }
        if let Some(button_seat) = mutation.button_seat {
            table.button_seat = Some(button_seat);
        }
        if let Some(current_hand) = &mutation.current_hand {
            current_hand.apply_to(&mut table.current_hand);
        }
        Ok(())
    }

    pub(crate) fn update_seat(&mut self, mutation: &SeatMutation) -> StoreResult<()> {
        let seat = self
            .seats
            .get_mut(&(mutation.table_id.clone(), mutation.seat_no))
            .ok_or_else(|| InvariantViolation::MissingRow {
                entity: "seat",
                key: seat_key(&mutation.table_id, mutation.seat_no),
            })?;
        if let Some(occupant) = &mutation.occupant {
            occupant.apply_to(&mut seat.occupant);
        }
        if let Some(stack) = mutation.stack {
            seat.stack = stack;
        }
        if let Some(status) = mutation.status {
            seat.status = status;
        }
        Ok(())
    }

    pub(crate) fn update_hand(&mut self, mutation: &HandMutation) -> StoreResult<()> {
        let hand = self
            .hands
            .get_mut(&mutation.hand_id)
            .ok_or_else(|| InvariantViolation::UnknownHand(mutation.hand_id.clone()))?;
        if let Some(street) = mutation.street {
            hand.street = street;
        }
        if let Some(pot) = mutation.pot {
            hand.pot = pot;
        }
        if let Some(board) = &mutation.board {
            hand.board = board.clone();
        }
        if let Some(status) = mutation.status {
            hand.status = status;
        }
        Ok(())
    }

    /// Returns whether the row was created.
    pub(crate) fn upsert_hand_player(&mut self, upsert: &HandPlayerUpsert) -> StoreResult<bool> {
        if !self.hands.contains_key(&upsert.hand_id) {
            return Err(InvariantViolation::UnknownHand(upsert.hand_id.clone()).into());
        }

        let key = (upsert.hand_id.clone(), upsert.actor_id.clone());
        let created = !self.hand_players.contains_key(&key);
        let mut row = self
            .hand_players
            .get(&key)
            .cloned()
            .unwrap_or_else(|| HandPlayerRow {
                hand_id: upsert.hand_id.clone(),
                actor_id: upsert.actor_id.clone(),
                seat_no: upsert.seat_no,
                committed: 0,
                folded: false,
                hole_cards: Vec::new(),
            });

        row.seat_no = upsert.seat_no;
        if let Some(committed) = upsert.committed {
            row.committed = committed;
        }
        if let Some(folded) = upsert.folded {
            row.folded = folded;
        }
        if let Some(cards) = &upsert.hole_cards {
            row.hole_cards = cards.clone();
        }
        self.hand_players.insert(key, row);
        Ok(created)
    }

    pub(crate) fn append_wallet_transaction(&mut self, entry: &WalletTransaction) -> StoreResult<()> {
        if self.ledger_ids.contains(&entry.transaction_id) {
            return Err(InvariantViolation::DuplicateLedgerEntry(entry.transaction_id).into());
        }
        if let Some(table_id) = &entry.table_id {
            if !self.tables.contains_key(table_id) {
                return Err(InvariantViolation::UnknownTable(table_id.clone()).into());
            }
        }
        if let Some(hand_id) = &entry.hand_id {
            match &entry.table_id {
                Some(table_id) => {
                    self.bound_hand(hand_id, table_id)?;
                }
                None if !self.hands.contains_key(hand_id) => {
                    return Err(InvariantViolation::UnknownHand(hand_id.clone()).into());
                }
                None => {}
            }
        }

        self.ledger_ids.insert(entry.transaction_id);
        self.ledger.push_back(entry.clone());
        Ok(())
    }
}
