//! The canonical match state as served by the engine. This is the central data
//! structure that gets synchronized; the client observes it, never mutates it.

use serde::{Deserialize, Serialize};

/// One of the two sides of a match. The viewer's own side is fixed for the
/// session lifetime, the opponent side is always the complement.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    P1,
    P2,
}

impl Side {
    /// The complementary side.
    pub fn opposite(self) -> Side {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
        }
    }
}

/// The sub-state of a turn that gates which actions are legal.
/// Unknown wire values decode to [`Phase::Unknown`] instead of failing the
/// whole snapshot; consumers treat that as [`Phase::Main`].
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Main,
    Ended,
    #[serde(other)]
    Unknown,
}

/// Everything about the current turn. `has_attacked` and `ability_used` reset
/// only on turn transition, which is owned by the engine.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    #[serde(default)]
    pub owner: Side,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub has_attacked: bool,
    #[serde(default)]
    pub ability_used: bool,
}

/// Unit cards sit on the board, spell cards are cast from the hand.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardKind {
    Unit,
    Spell,
}

/// An opaque reference to an ability the engine resolves. The key vocabulary
/// lives entirely in the engine; the client passes it through.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbilityRef {
    #[serde(alias = "abilityKey", alias = "key")]
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// A card as it appears in a hand or board array. A card has no lifecycle of
/// its own: it exists exactly as long as some container in the snapshot holds it.
///
/// Upstream payloads have historically carried the id under several names,
/// hence the aliases.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(alias = "cardId", alias = "CD_ID", alias = "id")]
    pub card_id: String,
    pub kind: CardKind,
    #[serde(default)]
    pub cost: u32,
    #[serde(default)]
    pub attack: Option<i32>,
    #[serde(default)]
    pub defense: Option<i32>,
    #[serde(default)]
    pub life: Option<i32>,
    #[serde(default)]
    pub abilities: Vec<AbilityRef>,
}

/// The per-side player state. The board array may arrive with any length;
/// consumers normalize it to exactly [`crate::BOARD_SLOTS`] nullable entries.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(default)]
    pub hp: i32,
    #[serde(default)]
    pub energy: u32,
    #[serde(default)]
    pub energy_max: u32,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub board: Vec<Option<Card>>,
}

/// The full serialized match state at one version. `version` is the sole
/// ordering authority: a snapshot with a version not greater than the one we
/// already hold is stale and gets dropped.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub turn: TurnState,
    #[serde(default)]
    pub p1: PlayerState,
    #[serde(default)]
    pub p2: PlayerState,
}

impl MatchSnapshot {
    /// The player state for the indicated side.
    pub fn player(&self, side: Side) -> &PlayerState {
        match side {
            Side::P1 => &self.p1,
            Side::P2 => &self.p2,
        }
    }
}
