//! The match session store. This is the core entry point of the system.
//!
//! The overall architecture is like this:
//! Frontend->MatchSession->ActionDispatcher->MatchTransport->remote engine
//! The engine is authoritative; the session only holds the last-known snapshot
//! and reconciles whatever the engine returns. Two independent asynchronous
//! activities share that snapshot: the self-rescheduling poll loop and the
//! at-most-one-outstanding action dispatch. Both funnel their payloads through
//! [`MatchSession::apply_server_payload`], so races between a poll response and
//! an action response are settled purely by snapshot version, last-applied-by-
//! version wins, not last-arrived.
//!
//! To use the system:
//! * Create the session with a transport, the viewer's side and a config.
//! * `load` the match (this is the only fetch that toggles the loading flag),
//!   then `start_polling`.
//! * Wire UI intents through the interaction flow and the typed submit helpers
//!   (`attack`, `play_card`, ...); each runs its legality precheck locally and
//!   only then dispatches.
//! * Render from `snapshot()`/`events()` via the projection functions, and
//!   gate controls on `status()`.
//! * Forward host visibility changes to `set_visible`; polling pauses while
//!   hidden and stops for good once the match phase is `Ended`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use protocol::{
    Card, ClientAction, GameEvent, MatchSnapshot, Phase, Rejection, ServerPayload, Side, TargetRef,
};

use crate::dispatcher::{
    ActionDispatcher, DEFAULT_DISPATCH_TIMEOUT, DEFAULT_SIGNATURE_CACHE_CAPACITY,
};
use crate::error::SessionError;
use crate::events::{DEFAULT_EVENT_LOG_CAPACITY, EventLog};
use crate::legality::{self, LegalityError};
use crate::reconcile;
use crate::transport::MatchTransport;

/// Tuning knobs for one session. The defaults match the engine's expectations;
/// override them builder-style where a host needs to.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Poll delay while the viewer owns the turn (nothing remote to wait for).
    pub own_turn_delay: Duration,
    /// Poll delay while waiting on the remote actor; shorter for responsiveness.
    pub enemy_turn_delay: Duration,
    /// Poll delay after a failed poll.
    pub error_backoff_delay: Duration,
    /// How often to re-check visibility while the host surface is hidden.
    pub hidden_recheck_delay: Duration,
    /// Window for the dispatch timeout race.
    pub dispatch_timeout: Duration,
    /// Ring capacity of the event log.
    pub event_log_capacity: usize,
    /// FIFO capacity of the action-signature id cache.
    pub signature_cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            own_turn_delay: Duration::from_millis(2500),
            enemy_turn_delay: Duration::from_millis(1200),
            error_backoff_delay: Duration::from_millis(4000),
            hidden_recheck_delay: Duration::from_millis(1000),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            signature_cache_capacity: DEFAULT_SIGNATURE_CACHE_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn with_poll_delays(mut self, own_turn: Duration, enemy_turn: Duration) -> Self {
        self.own_turn_delay = own_turn;
        self.enemy_turn_delay = enemy_turn;
        self
    }

    pub fn with_error_backoff(mut self, delay: Duration) -> Self {
        self.error_backoff_delay = delay;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }
}

/// A cloneable snapshot of what the UI needs for gating.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionStatus {
    /// True only during the initial `load`; polling is silent.
    pub loading: bool,
    /// True while an action dispatch is outstanding.
    pub sending: bool,
    /// The most recent user-facing hint, if any.
    pub hint: Option<String>,
    /// Version of the snapshot currently held.
    pub version: Option<u64>,
    /// True once the match reached its terminal phase.
    pub ended: bool,
}

/// How a submit attempt ended, short of a transport failure.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// The engine answered; its patch was applied. `rejected` carries the rule
    /// rejection if the engine declined the action.
    Applied { rejected: Option<Rejection> },
    /// A legality precheck failed; no network call was made.
    BlockedLocally { reason: String },
}

struct SessionState {
    match_id: Option<String>,
    snapshot: Option<MatchSnapshot>,
    events: EventLog,
    loading: bool,
    hint: Option<String>,
    last_poll_failed: bool,
    visible: bool,
    stopped: bool,
}

struct SessionInner<T: MatchTransport> {
    transport: Arc<T>,
    dispatcher: ActionDispatcher<T>,
    state: Mutex<SessionState>,
    viewer: Side,
    config: SessionConfig,
}

/// Owns the canonical snapshot plus event log for one match and keeps both
/// synchronized with the engine. Cheap to clone; clones share the session.
pub struct MatchSession<T: MatchTransport> {
    inner: Arc<SessionInner<T>>,
}

impl<T: MatchTransport> Clone for MatchSession<T> {
    fn clone(&self) -> Self {
        MatchSession {
            inner: self.inner.clone(),
        }
    }
}

impl<T: MatchTransport> MatchSession<T> {
    pub fn new(transport: Arc<T>, viewer: Side, config: SessionConfig) -> MatchSession<T> {
        let dispatcher = ActionDispatcher::with_tuning(
            transport.clone(),
            config.dispatch_timeout,
            config.signature_cache_capacity,
        );
        MatchSession {
            inner: Arc::new(SessionInner {
                transport,
                dispatcher,
                state: Mutex::new(SessionState {
                    match_id: None,
                    snapshot: None,
                    events: EventLog::new(config.event_log_capacity),
                    loading: false,
                    hint: None,
                    last_poll_failed: false,
                    visible: true,
                    stopped: false,
                }),
                viewer,
                config,
            }),
        }
    }

    /// The viewer's fixed side for this session.
    pub fn viewer(&self) -> Side {
        self.inner.viewer
    }

    /// Fetches the current snapshot, resets the event log and remembers the
    /// match id for polling. The only fetch that toggles the loading flag.
    pub async fn load(&self, match_id: Option<String>) -> Result<(), SessionError> {
        let match_id = {
            let mut state = self.lock_state();
            let id = match_id.or_else(|| state.match_id.clone());
            let Some(id) = id else {
                return Err(SessionError::NoMatchId);
            };
            // A different match starts from scratch; keeping the old snapshot
            // would make the version ordering drop the new match's state.
            if state.match_id.as_deref() != Some(id.as_str()) {
                state.snapshot = None;
            }
            state.match_id = Some(id.clone());
            state.loading = true;
            state.stopped = false;
            id
        };

        tracing::info!(%match_id, "loading match");
        let fetched = self.inner.transport.fetch_match(&match_id).await;
        let mut clear_loading = self.lock_state();
        clear_loading.loading = false;
        drop(clear_loading);

        match fetched {
            Ok(payload) => {
                self.apply_server_payload(payload, true);
                Ok(())
            }
            Err(error) => {
                let session_error = SessionError::from(error);
                self.set_hint(session_error.user_hint());
                Err(session_error)
            }
        }
    }

    /// Reconciles one engine payload: events append to the bounded log
    /// (after an optional reset), state is adopted only if strictly newer than
    /// what we hold. Stale state is dropped silently; that is the expected
    /// outcome of overlapping requests.
    pub fn apply_server_payload(&self, payload: ServerPayload, reset_events: bool) {
        let mut state = self.lock_state();
        if reset_events {
            state.events.clear();
        }
        state.events.extend(payload.events);
        if let Some(incoming) = payload.state {
            let (kept, adopted) = reconcile::reduce(state.snapshot.take(), incoming);
            if adopted {
                tracing::debug!(version = kept.version, "adopted snapshot");
            }
            if kept.turn.phase == Phase::Ended {
                state.stopped = true;
            }
            state.snapshot = Some(kept);
        }
    }

    /// Spawns the self-rescheduling poll loop. Each tick schedules the next
    /// one after it completes; the delay adapts to turn ownership and to the
    /// last poll's outcome. All poll fetches are silent.
    pub fn start_polling(&self) -> tokio::task::JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                let delay = session.next_poll_delay();
                tokio::time::sleep(delay).await;
                if session.is_stopped() {
                    tracing::debug!("poll loop stopping");
                    break;
                }
                if !session.is_visible() {
                    continue;
                }
                session.poll_once().await;
            }
        })
    }

    /// One silent poll tick.
    async fn poll_once(&self) {
        let Some(match_id) = self.lock_state().match_id.clone() else {
            return;
        };
        match self.inner.transport.fetch_match(&match_id).await {
            Ok(payload) => {
                self.lock_state().last_poll_failed = false;
                self.apply_server_payload(payload, false);
            }
            Err(error) => {
                tracing::warn!(%error, "poll failed");
                let mut state = self.lock_state();
                state.last_poll_failed = true;
                state.hint =
                    Some("Connection hiccup, the match will resync shortly.".to_string());
            }
        }
    }

    fn next_poll_delay(&self) -> Duration {
        let state = self.lock_state();
        if !state.visible {
            return self.inner.config.hidden_recheck_delay;
        }
        if state.last_poll_failed {
            return self.inner.config.error_backoff_delay;
        }
        let own_turn = state
            .snapshot
            .as_ref()
            .map(|snapshot| crate::projection::is_own_turn(snapshot, self.inner.viewer))
            .unwrap_or(false);
        if own_turn {
            self.inner.config.own_turn_delay
        } else {
            self.inner.config.enemy_turn_delay
        }
    }

    /// Forwarded host visibility. While hidden the loop only re-checks, it
    /// never fetches.
    pub fn set_visible(&self, visible: bool) {
        self.lock_state().visible = visible;
    }

    /// Stops the poll loop at its next iteration.
    pub fn stop(&self) {
        self.lock_state().stopped = true;
    }

    // -----------------------------------
    // Submission path.
    // -----------------------------------

    /// Ends the viewer's turn.
    pub async fn end_turn(&self) -> Result<SubmitOutcome, SessionError> {
        if let Some(blocked) = self.precheck(|snapshot, viewer| {
            legality::can_end_turn(snapshot, viewer)
        }) {
            return Ok(blocked);
        }
        self.submit(ClientAction::end_turn()).await
    }

    /// Attacks with the unit in the viewer's `attacker_slot`.
    pub async fn attack(&self, attacker_slot: u8) -> Result<SubmitOutcome, SessionError> {
        if let Some(blocked) = self.precheck(|snapshot, viewer| {
            legality::can_attack(snapshot, viewer, attacker_slot)
        }) {
            return Ok(blocked);
        }
        self.submit(ClientAction::attack(attacker_slot)).await
    }

    /// Plays a card from hand into the viewer's `slot`.
    pub async fn play_card(&self, card: &Card, slot: u8) -> Result<SubmitOutcome, SessionError> {
        if let Some(blocked) = self.precheck(|snapshot, viewer| {
            legality::can_play_card(snapshot, viewer, card.cost, slot)
        }) {
            return Ok(blocked);
        }
        self.submit(ClientAction::play_card(&card.card_id, slot))
            .await
    }

    /// Casts a spell, optionally with a named sub-variant and a target.
    pub async fn cast_spell(
        &self,
        card: &Card,
        choice: Option<&str>,
        target: Option<TargetRef>,
    ) -> Result<SubmitOutcome, SessionError> {
        if let Some(blocked) = self.precheck(|snapshot, viewer| {
            legality::can_cast_spell(snapshot, viewer, card.cost)
        }) {
            return Ok(blocked);
        }
        self.submit(ClientAction::cast_spell(&card.card_id, choice, target))
            .await
    }

    /// Activates an ability of the unit in `source_slot`. `extra` carries the
    /// ability-specific payload fields, passed through opaquely.
    pub async fn activate_ability(
        &self,
        source_slot: u8,
        ability_key: &str,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Result<SubmitOutcome, SessionError> {
        if let Some(blocked) = self.precheck(|snapshot, viewer| {
            legality::can_activate_ability(snapshot, viewer, source_slot)
        }) {
            return Ok(blocked);
        }
        self.submit(ClientAction::activate_ability(
            source_slot,
            ability_key,
            extra,
        ))
        .await
    }

    /// Raw submission for callers that built the action themselves (e.g. from
    /// an interaction-flow selection). No legality precheck.
    pub async fn submit_action(
        &self,
        action: ClientAction,
        force_new_id: bool,
    ) -> Result<SubmitOutcome, SessionError> {
        self.submit_with(action, force_new_id).await
    }

    async fn submit(&self, action: ClientAction) -> Result<SubmitOutcome, SessionError> {
        self.submit_with(action, false).await
    }

    async fn submit_with(
        &self,
        action: ClientAction,
        force_new_id: bool,
    ) -> Result<SubmitOutcome, SessionError> {
        let Some(match_id) = self.lock_state().match_id.clone() else {
            return Err(SessionError::NoMatchId);
        };
        match self
            .inner
            .dispatcher
            .dispatch(&match_id, action, force_new_id)
            .await
        {
            Ok(payload) => {
                let rejected = payload.rejected.clone();
                // A rejection still carries a valid patch; apply it regardless.
                self.apply_server_payload(payload, false);
                if let Some(rejection) = &rejected {
                    self.set_hint(format!(
                        "The server declined that action ({}).",
                        rejection.code
                    ));
                }
                Ok(SubmitOutcome::Applied { rejected })
            }
            Err(error) => {
                let session_error = SessionError::from(error);
                self.set_hint(session_error.user_hint());
                Err(session_error)
            }
        }
    }

    /// Runs one legality predicate against the held snapshot. Missing snapshot
    /// counts as blocked: nothing sensible can be dispatched before `load`.
    fn precheck(
        &self,
        check: impl FnOnce(&MatchSnapshot, Side) -> Result<(), LegalityError>,
    ) -> Option<SubmitOutcome> {
        let snapshot = self.lock_state().snapshot.clone();
        let Some(snapshot) = snapshot else {
            return Some(SubmitOutcome::BlockedLocally {
                reason: "The match is still loading.".to_string(),
            });
        };
        match check(&snapshot, self.inner.viewer) {
            Ok(()) => None,
            Err(reason) => {
                let reason = reason.to_string();
                self.set_hint(reason.clone());
                Some(SubmitOutcome::BlockedLocally { reason })
            }
        }
    }

    // -----------------------------------
    // Read access for the frontend.
    // -----------------------------------

    /// The snapshot currently held, if any.
    pub fn snapshot(&self) -> Option<MatchSnapshot> {
        self.lock_state().snapshot.clone()
    }

    /// The event log, oldest first.
    pub fn events(&self) -> Vec<GameEvent> {
        self.lock_state().events.to_vec()
    }

    /// The UI-gating status.
    pub fn status(&self) -> SessionStatus {
        let state = self.lock_state();
        SessionStatus {
            loading: state.loading,
            sending: self.inner.dispatcher.is_sending(),
            hint: state.hint.clone(),
            version: state.snapshot.as_ref().map(|snapshot| snapshot.version),
            ended: state
                .snapshot
                .as_ref()
                .map(|snapshot| snapshot.turn.phase == Phase::Ended)
                .unwrap_or(false),
        }
    }

    /// Clears the current hint after the frontend showed it.
    pub fn clear_hint(&self) {
        self.lock_state().hint = None;
    }

    fn set_hint(&self, hint: String) {
        self.lock_state().hint = Some(hint);
    }

    fn is_stopped(&self) -> bool {
        self.lock_state().stopped
    }

    fn is_visible(&self) -> bool {
        self.lock_state().visible
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.inner.state.lock().expect("session state poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use protocol::{DispatchEnvelope, TurnState};
    use serde_json::Map;

    struct StaticTransport {
        payload: ServerPayload,
    }

    #[async_trait]
    impl MatchTransport for StaticTransport {
        async fn fetch_match(&self, _match_id: &str) -> Result<ServerPayload, TransportError> {
            Ok(self.payload.clone())
        }

        async fn submit_action(
            &self,
            _match_id: &str,
            _envelope: &DispatchEnvelope,
        ) -> Result<ServerPayload, TransportError> {
            Ok(self.payload.clone())
        }
    }

    fn event(kind: &str) -> GameEvent {
        GameEvent {
            kind: kind.to_string(),
            data: Map::new(),
        }
    }

    fn snapshot(version: u64) -> MatchSnapshot {
        MatchSnapshot {
            version,
            ..MatchSnapshot::default()
        }
    }

    fn session() -> MatchSession<StaticTransport> {
        MatchSession::new(
            Arc::new(StaticTransport {
                payload: ServerPayload::default(),
            }),
            Side::P1,
            SessionConfig::default(),
        )
    }

    #[test]
    fn stale_state_is_dropped_but_events_still_append() {
        let session = session();
        session.apply_server_payload(
            ServerPayload {
                state: Some(snapshot(5)),
                events: vec![event("A")],
                ..ServerPayload::default()
            },
            false,
        );
        session.apply_server_payload(
            ServerPayload {
                state: Some(snapshot(3)),
                events: vec![event("B")],
                ..ServerPayload::default()
            },
            false,
        );
        assert_eq!(session.snapshot().unwrap().version, 5);
        let kinds: Vec<String> = session.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, ["A", "B"]);
    }

    #[test]
    fn reset_events_clears_the_log_first() {
        let session = session();
        session.apply_server_payload(
            ServerPayload {
                events: vec![event("OLD")],
                ..ServerPayload::default()
            },
            false,
        );
        session.apply_server_payload(
            ServerPayload {
                events: vec![event("NEW")],
                ..ServerPayload::default()
            },
            true,
        );
        let kinds: Vec<String> = session.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, ["NEW"]);
    }

    #[test]
    fn ended_phase_marks_the_session_stopped() {
        let session = session();
        let mut ended = snapshot(2);
        ended.turn = TurnState {
            phase: Phase::Ended,
            ..TurnState::default()
        };
        session.apply_server_payload(
            ServerPayload {
                state: Some(ended),
                ..ServerPayload::default()
            },
            false,
        );
        assert!(session.is_stopped());
        assert!(session.status().ended);
    }

    /// Answers each fetch with a version keyed by the match id, so a reload of
    /// a different match returns an unrelated (lower) version.
    struct PerMatchTransport;

    #[async_trait]
    impl MatchTransport for PerMatchTransport {
        async fn fetch_match(&self, match_id: &str) -> Result<ServerPayload, TransportError> {
            let version = if match_id == "m-old" { 100 } else { 1 };
            Ok(ServerPayload {
                state: Some(snapshot(version)),
                ..ServerPayload::default()
            })
        }

        async fn submit_action(
            &self,
            _match_id: &str,
            _envelope: &DispatchEnvelope,
        ) -> Result<ServerPayload, TransportError> {
            Ok(ServerPayload::default())
        }
    }

    #[tokio::test]
    async fn loading_a_different_match_adopts_its_state() {
        let session = MatchSession::new(
            Arc::new(PerMatchTransport),
            Side::P1,
            SessionConfig::default(),
        );
        session.load(Some("m-old".to_string())).await.unwrap();
        assert_eq!(session.snapshot().unwrap().version, 100);
        // The new match starts at a lower version; it must still win.
        session.load(Some("m-new".to_string())).await.unwrap();
        assert_eq!(session.snapshot().unwrap().version, 1);
    }

    #[tokio::test]
    async fn load_without_a_match_id_fails() {
        let session = session();
        let result = session.load(None).await;
        assert!(matches!(result, Err(SessionError::NoMatchId)));
    }

    #[tokio::test]
    async fn submit_before_load_is_blocked_locally() {
        let session = session();
        session.load(Some("m-1".to_string())).await.unwrap();
        // The static transport returned no state, so the precheck blocks.
        let outcome = session.attack(0).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::BlockedLocally { .. }));
    }

    #[test]
    fn poll_delay_adapts_to_turn_ownership_and_errors() {
        let session = session();
        let config = SessionConfig::default();
        // No snapshot yet: treated as the enemy acting.
        assert_eq!(session.next_poll_delay(), config.enemy_turn_delay);

        let mut own_turn = snapshot(1);
        own_turn.turn.owner = Side::P1;
        session.apply_server_payload(
            ServerPayload {
                state: Some(own_turn),
                ..ServerPayload::default()
            },
            false,
        );
        assert_eq!(session.next_poll_delay(), config.own_turn_delay);

        session.lock_state().last_poll_failed = true;
        assert_eq!(session.next_poll_delay(), config.error_backoff_delay);
    }
}
