//! The wire contract with the remote match engine. These types are used consistently
//! across the client and mirror what the engine serves over HTTP.
//!
//! The engine is authoritative: the client never computes game outcomes, it only
//! decodes what the engine returns. Decoding is deliberately tolerant (field
//! aliases, defaults) so that normalization happens exactly once, here at the
//! boundary, and the rest of the client sees a single canonical schema.

mod action;
mod event;
mod snapshot;

pub use action::{ActionType, ClientAction, DispatchEnvelope, TargetRef, signature_id};
pub use event::{GameEvent, Rejection, ServerPayload};
pub use snapshot::{AbilityRef, Card, CardKind, MatchSnapshot, Phase, PlayerState, Side, TurnState};

/// The number of board slots each side has. The engine may send shorter or longer
/// arrays; consumers normalize to exactly this many.
pub const BOARD_SLOTS: usize = 3;
