// ============================================================================
// Event Records
// ============================================================================
//
// One record per committed batch. Ordering is carried by two independent
// counters: `table_seq` (global per table) and `hand_seq` (per hand, restarts
// with every hand). Both are assigned upstream and checked by the storage
// layer, never here.
//
// ============================================================================

use crate::core::{HandId, InvariantViolation, TableId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const VOCABULARY_V1: u32 = 1;

/// Highest vocabulary version this build knows.
pub const VOCABULARY_LATEST: u32 = VOCABULARY_V1;

/// The closed v1 event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HandStarted,
    BlindPosted,
    HoleCardsDealt,
    PlayerChecked,
    PlayerCalled,
    PlayerBet,
    PlayerRaised,
    PlayerFolded,
    PlayerAllIn,
    StreetDealt,
    ShowdownRevealed,
    PotAwarded,
    HandEnded,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::HandStarted,
        EventKind::BlindPosted,
        EventKind::HoleCardsDealt,
        EventKind::PlayerChecked,
        EventKind::PlayerCalled,
        EventKind::PlayerBet,
        EventKind::PlayerRaised,
        EventKind::PlayerFolded,
        EventKind::PlayerAllIn,
        EventKind::StreetDealt,
        EventKind::ShowdownRevealed,
        EventKind::PotAwarded,
        EventKind::HandEnded,
    ];

    /// Wire tag stored on the event record.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::HandStarted => "hand_started",
            EventKind::BlindPosted => "blind_posted",
            EventKind::HoleCardsDealt => "hole_cards_dealt",
            EventKind::PlayerChecked => "player_checked",
            EventKind::PlayerCalled => "player_called",
            EventKind::PlayerBet => "player_bet",
            EventKind::PlayerRaised => "player_raised",
            EventKind::PlayerFolded => "player_folded",
            EventKind::PlayerAllIn => "player_all_in",
            EventKind::StreetDealt => "street_dealt",
            EventKind::ShowdownRevealed => "showdown_revealed",
            EventKind::PotAwarded => "pot_awarded",
            EventKind::HandEnded => "hand_ended",
        }
    }

    /// Vocabulary version that introduced this kind.
    pub fn since_version(&self) -> u32 {
        VOCABULARY_V1
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = InvariantViolation;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| InvariantViolation::UnknownEventKind {
                kind: tag.to_string(),
                vocabulary_version: VOCABULARY_V1,
            })
    }
}

/// The set of kind tags a store accepts, pinned to one vocabulary version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventVocabulary {
    version: u32,
    tags: BTreeSet<String>,
}

impl EventVocabulary {
    /// All kinds introduced at or before `version`, or `None` when the
    /// version is outside `1..=VOCABULARY_LATEST`.
    pub fn for_version(version: u32) -> Option<Self> {
        (1..=VOCABULARY_LATEST)
            .contains(&version)
            .then(|| Self::build(version))
    }

    pub fn v1() -> Self {
        Self::build(VOCABULARY_V1)
    }

    fn build(version: u32) -> Self {
        let tags = EventKind::ALL
            .iter()
            .filter(|kind| kind.since_version() <= version)
            .map(|kind| kind.as_str().to_string())
            .collect();
        Self { version, tags }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn check(&self, tag: &str) -> Result<(), InvariantViolation> {
        if self.contains(tag) {
            Ok(())
        } else {
            Err(InvariantViolation::UnknownEventKind {
                kind: tag.to_string(),
                vocabulary_version: self.version,
            })
        }
    }
}

impl Default for EventVocabulary {
    fn default() -> Self {
        Self::v1()
    }
}

/// An immutable game-state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub hand_id: HandId,
    pub table_id: TableId,
    pub table_seq: u64,
    pub hand_seq: u64,
    /// Wire tag. Kept as a string so the storage boundary, not the type
    /// system, decides whether a tag produced upstream is acceptable.
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        table_id: impl Into<TableId>,
        hand_id: impl Into<HandId>,
        table_seq: u64,
        hand_seq: u64,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_raw_kind(table_id, hand_id, table_seq, hand_seq, kind.as_str(), payload)
    }

    /// Builds a record from an unchecked kind tag, as delivered by the rules engine.
    pub fn with_raw_kind(
        table_id: impl Into<TableId>,
        hand_id: impl Into<HandId>,
        table_seq: u64,
        hand_seq: u64,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            hand_id: hand_id.into(),
            table_id: table_id.into(),
            table_seq,
            hand_seq,
            kind: kind.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Parsed kind, if the tag belongs to the known vocabulary.
    pub fn event_kind(&self) -> Result<EventKind, InvariantViolation> {
        self.kind.parse()
    }
}
