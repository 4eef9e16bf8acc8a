//! Pure derivations that turn a raw snapshot into viewer-relative values.
//! No side effects, no network; everything tolerates sparse snapshots and
//! returns stable defaults instead of failing.

use protocol::{BOARD_SLOTS, Card, MatchSnapshot, Phase, Side};

/// The board of `side`, normalized to exactly [`BOARD_SLOTS`] nullable slots:
/// longer wire arrays are truncated, shorter ones are null-padded.
pub fn board3(snapshot: &MatchSnapshot, side: Side) -> [Option<Card>; BOARD_SLOTS] {
    let raw = &snapshot.player(side).board;
    std::array::from_fn(|i| raw.get(i).cloned().flatten())
}

/// The flat 6-slot layout the board renderer expects: enemy slots at indices
/// 0..=2, the viewer's own slots at 3..=5.
pub fn build_slots(
    enemy: [Option<Card>; BOARD_SLOTS],
    own: [Option<Card>; BOARD_SLOTS],
) -> [Option<Card>; BOARD_SLOTS * 2] {
    let [e0, e1, e2] = enemy;
    let [o0, o1, o2] = own;
    [e0, e1, e2, o0, o1, o2]
}

/// Current and maximum energy of `side`.
pub fn energy(snapshot: &MatchSnapshot, side: Side) -> (u32, u32) {
    let player = snapshot.player(side);
    (player.energy, player.energy_max)
}

/// The hand of `side`.
pub fn hand(snapshot: &MatchSnapshot, side: Side) -> &[Card] {
    &snapshot.player(side).hand
}

/// Who owns the current turn. Defaults to P1 on a default-constructed turn.
pub fn turn_owner(snapshot: &MatchSnapshot) -> Side {
    snapshot.turn.owner
}

/// The current phase. An unrecognized wire phase projects to `Main` so that a
/// newer engine cannot wedge an older client.
pub fn phase(snapshot: &MatchSnapshot) -> Phase {
    match snapshot.turn.phase {
        Phase::Unknown => Phase::Main,
        known => known,
    }
}

/// Whether the viewer owns the current turn.
pub fn is_own_turn(snapshot: &MatchSnapshot, viewer: Side) -> bool {
    turn_owner(snapshot) == viewer
}
