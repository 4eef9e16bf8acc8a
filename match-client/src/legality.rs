//! Client-side legality prechecks. A smart preselection only: failing a
//! predicate saves a network round trip that would be rejected anyway, but the
//! engine re-validates everything and its word is final.

use protocol::{BOARD_SLOTS, Card, MatchSnapshot, Phase, Side};
use thiserror::Error;

use crate::projection;

/// Why an action was blocked locally. The display text doubles as the hint a
/// frontend shows next to the blocked control.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LegalityError {
    #[error("It is not your turn.")]
    NotYourTurn,
    #[error("You cannot do that in this phase.")]
    WrongPhase,
    #[error("There is no unit in that slot.")]
    EmptySlot,
    #[error("That slot is out of range.")]
    SlotOutOfRange,
    #[error("You already attacked this turn.")]
    AlreadyAttacked,
    #[error("You already used an ability this turn.")]
    AbilityAlreadyUsed,
    #[error("Not enough energy.")]
    NotEnoughEnergy,
}

/// Shared by every action: the viewer must own the turn and the turn must be
/// in its main phase.
fn check_turn(snapshot: &MatchSnapshot, viewer: Side) -> Result<(), LegalityError> {
    if !projection::is_own_turn(snapshot, viewer) {
        return Err(LegalityError::NotYourTurn);
    }
    if projection::phase(snapshot) != Phase::Main {
        return Err(LegalityError::WrongPhase);
    }
    Ok(())
}

fn occupied_slot(
    snapshot: &MatchSnapshot,
    side: Side,
    slot: u8,
) -> Result<Card, LegalityError> {
    if slot as usize >= BOARD_SLOTS {
        return Err(LegalityError::SlotOutOfRange);
    }
    projection::board3(snapshot, side)[slot as usize]
        .clone()
        .ok_or(LegalityError::EmptySlot)
}

/// May the viewer end the turn right now?
pub fn can_end_turn(snapshot: &MatchSnapshot, viewer: Side) -> Result<(), LegalityError> {
    check_turn(snapshot, viewer)
}

/// May the unit in the viewer's `attacker_slot` attack? One attack per turn.
pub fn can_attack(
    snapshot: &MatchSnapshot,
    viewer: Side,
    attacker_slot: u8,
) -> Result<(), LegalityError> {
    check_turn(snapshot, viewer)?;
    if snapshot.turn.has_attacked {
        return Err(LegalityError::AlreadyAttacked);
    }
    occupied_slot(snapshot, viewer, attacker_slot)?;
    Ok(())
}

/// May the viewer play the card with the given cost into a board slot?
pub fn can_play_card(
    snapshot: &MatchSnapshot,
    viewer: Side,
    cost: u32,
    slot: u8,
) -> Result<(), LegalityError> {
    check_turn(snapshot, viewer)?;
    if slot as usize >= BOARD_SLOTS {
        return Err(LegalityError::SlotOutOfRange);
    }
    let (energy, _) = projection::energy(snapshot, viewer);
    if cost > energy {
        return Err(LegalityError::NotEnoughEnergy);
    }
    Ok(())
}

/// May the viewer cast a spell? Spells are disallowed after attacking.
pub fn can_cast_spell(
    snapshot: &MatchSnapshot,
    viewer: Side,
    cost: u32,
) -> Result<(), LegalityError> {
    check_turn(snapshot, viewer)?;
    if snapshot.turn.has_attacked {
        return Err(LegalityError::AlreadyAttacked);
    }
    let (energy, _) = projection::energy(snapshot, viewer);
    if cost > energy {
        return Err(LegalityError::NotEnoughEnergy);
    }
    Ok(())
}

/// May the unit in the viewer's `source_slot` activate an ability? At most one
/// activation per turn, and none after attacking.
pub fn can_activate_ability(
    snapshot: &MatchSnapshot,
    viewer: Side,
    source_slot: u8,
) -> Result<(), LegalityError> {
    check_turn(snapshot, viewer)?;
    if snapshot.turn.has_attacked {
        return Err(LegalityError::AlreadyAttacked);
    }
    if snapshot.turn.ability_used {
        return Err(LegalityError::AbilityAlreadyUsed);
    }
    occupied_slot(snapshot, viewer, source_slot)?;
    Ok(())
}
