//! End-to-end scenarios for the session store: load, poll reconciliation,
//! action dispatch, legality short-circuit and timeout retry, all driven
//! through a scripted in-memory transport that counts every request.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use match_client::{
    ActionOption, InteractionFlow, InteractionPlan, MatchSession, MatchTransport, RelativeSide,
    SessionConfig, SessionError, Step, SubmitOutcome, TargetRule, TargetSides, TransportError,
};
use protocol::{
    Card, CardKind, DispatchEnvelope, MatchSnapshot, Phase, PlayerState, Rejection, ServerPayload,
    Side, TurnState,
};
use serde_json::Map;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "match_client=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Serves queued fetch/action responses and records everything it was asked.
struct ScriptedTransport {
    fetch_responses: Mutex<VecDeque<Result<ServerPayload, TransportError>>>,
    action_responses: Mutex<VecDeque<Result<ServerPayload, TransportError>>>,
    fetch_count: AtomicUsize,
    action_count: AtomicUsize,
    seen_envelopes: Mutex<Vec<DispatchEnvelope>>,
    /// When set, every action response is held back this long first.
    action_hold: Option<Duration>,
}

impl ScriptedTransport {
    fn new() -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport {
            fetch_responses: Mutex::new(VecDeque::new()),
            action_responses: Mutex::new(VecDeque::new()),
            fetch_count: AtomicUsize::new(0),
            action_count: AtomicUsize::new(0),
            seen_envelopes: Mutex::new(Vec::new()),
            action_hold: None,
        })
    }

    fn holding_actions(hold: Duration) -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport {
            fetch_responses: Mutex::new(VecDeque::new()),
            action_responses: Mutex::new(VecDeque::new()),
            fetch_count: AtomicUsize::new(0),
            action_count: AtomicUsize::new(0),
            seen_envelopes: Mutex::new(Vec::new()),
            action_hold: Some(hold),
        })
    }

    fn queue_fetch(&self, payload: ServerPayload) {
        self.fetch_responses.lock().unwrap().push_back(Ok(payload));
    }

    fn queue_fetch_error(&self, error: TransportError) {
        self.fetch_responses.lock().unwrap().push_back(Err(error));
    }

    fn queue_action(&self, payload: ServerPayload) {
        self.action_responses.lock().unwrap().push_back(Ok(payload));
    }

    fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    fn actions(&self) -> usize {
        self.action_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchTransport for ScriptedTransport {
    async fn fetch_match(&self, _match_id: &str) -> Result<ServerPayload, TransportError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ServerPayload::default()))
    }

    async fn submit_action(
        &self,
        _match_id: &str,
        envelope: &DispatchEnvelope,
    ) -> Result<ServerPayload, TransportError> {
        self.action_count.fetch_add(1, Ordering::SeqCst);
        self.seen_envelopes.lock().unwrap().push(envelope.clone());
        if let Some(hold) = self.action_hold {
            tokio::time::sleep(hold).await;
        }
        self.action_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ServerPayload::default()))
    }
}

fn unit(id: &str) -> Card {
    Card {
        card_id: id.to_string(),
        kind: CardKind::Unit,
        cost: 2,
        attack: Some(2),
        defense: Some(1),
        life: Some(3),
        abilities: Vec::new(),
    }
}

/// Viewer is P1, P1 owns the turn in the main phase, one unit at P1 slot 0.
fn base_snapshot(version: u64) -> MatchSnapshot {
    MatchSnapshot {
        version,
        turn: TurnState {
            owner: Side::P1,
            number: 1,
            phase: Phase::Main,
            has_attacked: false,
            ability_used: false,
        },
        p1: PlayerState {
            hp: 20,
            energy: 4,
            energy_max: 6,
            hand: vec![],
            board: vec![Some(unit("u-1")), None, None],
        },
        p2: PlayerState {
            hp: 20,
            energy: 4,
            energy_max: 6,
            hand: vec![],
            board: vec![Some(unit("e-1")), None, None],
        },
    }
}

fn state_payload(snapshot: MatchSnapshot) -> ServerPayload {
    ServerPayload {
        state: Some(snapshot),
        ..ServerPayload::default()
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .with_poll_delays(Duration::from_millis(50), Duration::from_millis(20))
        .with_error_backoff(Duration::from_millis(100))
}

#[tokio::test]
async fn attack_round_trip_adopts_the_new_state() {
    init_tracing();
    let transport = ScriptedTransport::new();
    transport.queue_fetch(state_payload(base_snapshot(1)));
    let mut attacked = base_snapshot(2);
    attacked.turn.has_attacked = true;
    transport.queue_action(state_payload(attacked));

    let session = MatchSession::new(transport.clone(), Side::P1, SessionConfig::default());
    session.load(Some("m-1".to_string())).await.unwrap();
    assert_eq!(session.snapshot().unwrap().version, 1);

    let outcome = session.attack(0).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Applied { rejected: None });
    assert_eq!(transport.actions(), 1);

    let snapshot = session.snapshot().unwrap();
    assert_eq!(snapshot.version, 2);
    assert!(snapshot.turn.has_attacked);
}

#[tokio::test]
async fn spell_after_attacking_is_blocked_without_a_request() {
    init_tracing();
    let transport = ScriptedTransport::new();
    let mut already_attacked = base_snapshot(1);
    already_attacked.turn.has_attacked = true;
    transport.queue_fetch(state_payload(already_attacked));

    let session = MatchSession::new(transport.clone(), Side::P1, SessionConfig::default());
    session.load(Some("m-1".to_string())).await.unwrap();

    let spell = Card {
        kind: CardKind::Spell,
        ..unit("s-1")
    };
    let outcome = session.cast_spell(&spell, None, None).await.unwrap();
    let SubmitOutcome::BlockedLocally { reason } = outcome else {
        panic!("expected a local block");
    };
    assert!(!reason.is_empty());
    assert_eq!(transport.actions(), 0);
    assert_eq!(session.status().hint, Some(reason));
}

#[tokio::test(start_paused = true)]
async fn timed_out_dispatch_retries_with_the_same_action_id() {
    init_tracing();
    let transport = ScriptedTransport::holding_actions(Duration::from_secs(120));
    transport.queue_fetch(state_payload(base_snapshot(1)));

    let config = SessionConfig::default().with_dispatch_timeout(Duration::from_millis(50));
    let session = MatchSession::new(transport.clone(), Side::P1, config);
    session.load(Some("m-1".to_string())).await.unwrap();

    let first = session.attack(0).await;
    assert!(matches!(
        first,
        Err(SessionError::Dispatch(match_client::DispatchError::Transport(
            TransportError::Timeout
        )))
    ));

    let second = session.attack(0).await;
    assert!(matches!(second, Err(_)));

    let envelopes = transport.seen_envelopes.lock().unwrap();
    assert_eq!(envelopes.len(), 2);
    assert_eq!(
        envelopes[0].client_action_id,
        envelopes[1].client_action_id
    );
}

#[tokio::test]
async fn rejection_still_applies_the_corrective_patch() {
    init_tracing();
    let transport = ScriptedTransport::new();
    transport.queue_fetch(state_payload(base_snapshot(1)));
    let mut corrective = state_payload(base_snapshot(3));
    corrective.rejected = Some(Rejection {
        code: "NOT_ENOUGH_ENERGY".to_string(),
        data: Map::new(),
    });
    transport.queue_action(corrective);

    let session = MatchSession::new(transport.clone(), Side::P1, SessionConfig::default());
    session.load(Some("m-1".to_string())).await.unwrap();

    let outcome = session.attack(0).await.unwrap();
    let SubmitOutcome::Applied { rejected } = outcome else {
        panic!("a rejection is still an applied response");
    };
    assert_eq!(rejected.unwrap().code, "NOT_ENOUGH_ENERGY");
    // The corrective state was adopted and the hint names the code.
    assert_eq!(session.snapshot().unwrap().version, 3);
    assert!(
        session
            .status()
            .hint
            .unwrap()
            .contains("NOT_ENOUGH_ENERGY")
    );
}

#[tokio::test(start_paused = true)]
async fn poll_loop_reconciles_versions_and_stops_on_ended() {
    init_tracing();
    let transport = ScriptedTransport::new();
    transport.queue_fetch(state_payload(base_snapshot(1))); // load
    transport.queue_fetch(state_payload(base_snapshot(4))); // poll 1
    transport.queue_fetch(state_payload(base_snapshot(2))); // poll 2, stale
    let mut ended = base_snapshot(5);
    ended.turn.phase = Phase::Ended;
    transport.queue_fetch(state_payload(ended)); // poll 3, terminal

    let session = MatchSession::new(transport.clone(), Side::P1, fast_config());
    session.load(Some("m-1".to_string())).await.unwrap();
    let handle = session.start_polling();

    // Three own-turn poll ticks land within this window.
    tokio::time::sleep(Duration::from_millis(400)).await;

    let snapshot = session.snapshot().unwrap();
    assert_eq!(snapshot.version, 5);
    assert!(session.status().ended);

    // The loop observed the terminal phase and wound down on its own.
    handle.await.unwrap();
    let fetches_after_stop = transport.fetches();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(transport.fetches(), fetches_after_stop);
}

#[tokio::test(start_paused = true)]
async fn polling_is_suspended_while_hidden() {
    init_tracing();
    let transport = ScriptedTransport::new();
    transport.queue_fetch(state_payload(base_snapshot(1)));

    let session = MatchSession::new(transport.clone(), Side::P1, fast_config());
    session.load(Some("m-1".to_string())).await.unwrap();
    session.set_visible(false);
    let handle = session.start_polling();

    tokio::time::sleep(Duration::from_secs(10)).await;
    // Only the initial load fetched anything.
    assert_eq!(transport.fetches(), 1);

    session.set_visible(true);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(transport.fetches() > 1);

    session.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn interaction_flow_selection_dispatches_as_an_ability() {
    init_tracing();
    let transport = ScriptedTransport::new();
    transport.queue_fetch(state_payload(base_snapshot(1)));
    let mut used = base_snapshot(2);
    used.turn.ability_used = true;
    transport.queue_action(state_payload(used));

    let session = MatchSession::new(transport.clone(), Side::P1, SessionConfig::default());
    session.load(Some("m-1".to_string())).await.unwrap();

    // Clicking an own unit offers attack vs. ability; the ability needs an
    // enemy target.
    let mut flow = InteractionFlow::new(InteractionPlan::ActionMenu {
        options: vec![
            ActionOption {
                key: "ATTACK".to_string(),
                label: "Attack".to_string(),
                choices: Vec::new(),
                target: None,
            },
            ActionOption {
                key: "DIRECT_DAMAGE_UNIT".to_string(),
                label: "Zap".to_string(),
                choices: Vec::new(),
                target: Some(TargetRule::new(TargetSides::EnemyOnly)),
            },
        ],
    });
    flow.pick_action("DIRECT_DAMAGE_UNIT").unwrap();
    let Step::Done(selection) = flow.pick_target(RelativeSide::Enemy, 0).unwrap() else {
        panic!("expected the flow to finish");
    };

    let target_side = selection.side.unwrap().absolute(session.viewer());
    let mut extra = Map::new();
    extra.insert(
        "target".to_string(),
        serde_json::json!({ "side": target_side, "slot": selection.slot.unwrap() }),
    );
    let action = protocol::ClientAction::activate_ability(0, &selection.action_key, extra);
    let outcome = session.submit_action(action, false).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Applied { rejected: None });

    let envelopes = transport.seen_envelopes.lock().unwrap();
    assert_eq!(envelopes.len(), 1);
    let wire = serde_json::to_value(&envelopes[0]).unwrap();
    assert_eq!(wire["action"]["type"], "ACTIVATE_ABILITY");
    assert_eq!(wire["action"]["payload"]["abilityKey"], "DIRECT_DAMAGE_UNIT");
    assert_eq!(wire["action"]["payload"]["source"]["slot"], 0);
    assert_eq!(wire["action"]["payload"]["target"]["side"], "P2");
    assert!(session.snapshot().unwrap().turn.ability_used);
}

#[tokio::test(start_paused = true)]
async fn failed_polls_back_off_and_recover_with_a_hint() {
    init_tracing();
    let transport = ScriptedTransport::new();
    transport.queue_fetch(state_payload(base_snapshot(1)));
    transport.queue_fetch_error(TransportError::BadStatus(502));
    transport.queue_fetch(state_payload(base_snapshot(2)));

    let session = MatchSession::new(transport.clone(), Side::P1, fast_config());
    session.load(Some("m-1".to_string())).await.unwrap();
    let handle = session.start_polling();

    tokio::time::sleep(Duration::from_secs(2)).await;

    // The failed poll surfaced as a hint, not an error, and the session
    // recovered to the newer snapshot afterwards.
    assert_eq!(session.snapshot().unwrap().version, 2);
    assert!(session.status().hint.is_some());

    session.stop();
    handle.await.unwrap();
}
