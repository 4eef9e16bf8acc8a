//! The error taxonomy of the client. Nothing past the dispatcher boundary ever
//! throws: every failure becomes a value here, and the UI layer only ever sees
//! the hint text these values map to.

use thiserror::Error;

/// Failures of the network layer itself. `Timeout` is split out from the
/// generic cases because a timed-out action may safely be re-dispatched with
/// the same client action id.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request never completed (connection refused, DNS, reset, ...).
    #[error("request failed: {0}")]
    Request(String),
    /// The engine answered with a non-2xx status.
    #[error("engine answered with status {0}")]
    BadStatus(u16),
    /// The body did not decode into the expected payload shape.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The configured window elapsed before the request settled. Whether the
    /// engine applied the action is unknown.
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        TransportError::Request(error.to_string())
    }
}

/// Failures of a single dispatch attempt.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Another dispatch is still outstanding. Local-only, no network work was
    /// done; try again once the current one settles.
    #[error("an action is already in flight")]
    InFlight,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures surfaced by the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    /// `load` was called without a match id being available.
    #[error("no match id available")]
    NoMatchId,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// The short text a frontend should show for this failure. Kept deliberately
    /// vague for transport hiccups: the session stays usable and retries on its own.
    pub fn user_hint(&self) -> String {
        match self {
            SessionError::NoMatchId => "No match selected.".to_string(),
            SessionError::Dispatch(DispatchError::InFlight) => {
                "Still sending the previous action, try again in a moment.".to_string()
            }
            SessionError::Dispatch(DispatchError::Transport(TransportError::Timeout))
            | SessionError::Transport(TransportError::Timeout) => {
                "The server took too long to answer. You can retry the action.".to_string()
            }
            SessionError::Dispatch(DispatchError::Transport(_))
            | SessionError::Transport(_) => {
                "Connection hiccup, the match will resync shortly.".to_string()
            }
        }
    }
}
