//! Client-side synchronization and action dispatch for a turn-based
//! card-battle match served by a remote, authoritative engine.
//!
//! The engine is consumed over a polling HTTP contract; this crate keeps the
//! last-known snapshot reconciled against it, pre-checks action legality for
//! UX, and submits player actions exactly-once-effectively despite retries,
//! timeouts and double-clicks. Rendering, authentication and the rules engine
//! itself live elsewhere.

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod flow;
pub mod legality;
pub mod projection;
pub mod reconcile;
pub mod session;
pub mod transport;

pub use dispatcher::{ActionDispatcher, DispatchGate};
pub use error::{DispatchError, SessionError, TransportError};
pub use events::EventLog;
pub use flow::{
    ActionOption, ChoiceOption, FlowError, InteractionFlow, InteractionPlan, RelativeSide,
    Selection, SlotMask, Stage, Step, TargetRule, TargetSides,
};
pub use legality::LegalityError;
pub use session::{MatchSession, SessionConfig, SessionStatus, SubmitOutcome};
pub use transport::{HttpTransport, MatchTransport};
