use super::{EventRecord, HandMutation, HandPlayerUpsert, SeatMutation, TableMutation, WalletTransaction};
use crate::core::BatchError;
use serde::{Deserialize, Serialize};

/// The atomic unit of persistence work produced from one accepted command.
///
/// Always carries exactly one event record; there is no way to construct or
/// deserialize one without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CommandBatchDraft")]
pub struct CommandBatch {
    event: EventRecord,
    table: Option<TableMutation>,
    seats: Vec<SeatMutation>,
    hand: Option<HandMutation>,
    hand_players: Vec<HandPlayerUpsert>,
    wallet_transactions: Vec<WalletTransaction>,
}

impl CommandBatch {
    /// A batch with only its event record.
    pub fn new(event: EventRecord) -> Self {
        Self {
            event,
            table: None,
            seats: Vec::new(),
            hand: None,
            hand_players: Vec::new(),
            wallet_transactions: Vec::new(),
        }
    }

    pub fn builder() -> CommandBatchBuilder {
        CommandBatchBuilder::default()
    }

    pub fn event(&self) -> &EventRecord {
        &self.event
    }

    pub fn table(&self) -> Option<&TableMutation> {
        self.table.as_ref()
    }

    pub fn seats(&self) -> &[SeatMutation] {
        &self.seats
    }

    pub fn hand(&self) -> Option<&HandMutation> {
        self.hand.as_ref()
    }

    pub fn hand_players(&self) -> &[HandPlayerUpsert] {
        &self.hand_players
    }

    pub fn wallet_transactions(&self) -> &[WalletTransaction] {
        &self.wallet_transactions
    }

    /// Number of mutation groups that will be applied after the event.
    pub fn mutation_group_count(&self) -> usize {
        usize::from(self.table.is_some())
            + usize::from(!self.seats.is_empty())
            + usize::from(self.hand.is_some())
            + usize::from(!self.hand_players.is_empty())
            + usize::from(!self.wallet_transactions.is_empty())
    }

    pub fn into_event(self) -> EventRecord {
        self.event
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandBatchBuilder {
    draft: CommandBatchDraft,
}

impl CommandBatchBuilder {
    pub fn event(mut self, event: EventRecord) -> Self {
        self.draft.event = Some(event);
        self
    }

    pub fn table(mut self, mutation: TableMutation) -> Self {
        self.draft.table = Some(mutation);
        self
    }

    pub fn seat(mut self, mutation: SeatMutation) -> Self {
        self.draft.seats.push(mutation);
        self
    }

    pub fn seats(mut self, mutations: impl IntoIterator<Item = SeatMutation>) -> Self {
        self.draft.seats.extend(mutations);
        self
    }

    pub fn hand(mut self, mutation: HandMutation) -> Self {
        self.draft.hand = Some(mutation);
        self
    }

    pub fn hand_player(mut self, upsert: HandPlayerUpsert) -> Self {
        self.draft.hand_players.push(upsert);
        self
    }

    pub fn hand_players(mut self, upserts: impl IntoIterator<Item = HandPlayerUpsert>) -> Self {
        self.draft.hand_players.extend(upserts);
        self
    }

    pub fn wallet_transaction(mut self, entry: WalletTransaction) -> Self {
        self.draft.wallet_transactions.push(entry);
        self
    }

    pub fn wallet_transactions(
        mut self,
        entries: impl IntoIterator<Item = WalletTransaction>,
    ) -> Self {
        self.draft.wallet_transactions.extend(entries);
        self
    }

    pub fn build(self) -> Result<CommandBatch, BatchError> {
        CommandBatch::try_from(self.draft)
    }
}

/// Wire shape of a batch before the event requirement is checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandBatchDraft {
    #[serde(default)]
    pub event: Option<EventRecord>,
    #[serde(default)]
    pub table: Option<TableMutation>,
    #[serde(default)]
    pub seats: Vec<SeatMutation>,
    #[serde(default)]
    pub hand: Option<HandMutation>,
    #[serde(default)]
    pub hand_players: Vec<HandPlayerUpsert>,
    #[serde(default)]
    pub wallet_transactions: Vec<WalletTransaction>,
}

impl TryFrom<CommandBatchDraft> for CommandBatch {
    type Error = BatchError;

    fn try_from(draft: CommandBatchDraft) -> Result<Self, Self::Error> {
        let event = draft.event.ok_or(BatchError::MissingEvent)?;
        Ok(Self {
            event,
            table: draft.table,
            seats: draft.seats,
            hand: draft.hand,
            hand_players: draft.hand_players,
            wallet_transactions: draft.wallet_transactions,
        })
    }
}
