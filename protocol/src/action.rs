//! Player-initiated actions and the envelope they travel in.
//!
//! An action is immutable once built. The envelope pairs it with a client
//! action id derived from the structural signature of `(type, payload)`, so a
//! retried identical action carries the same id and the engine can recognize
//! it as the same request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::snapshot::Side;

/// The action vocabulary of the engine's `POST /matches/{id}/actions` endpoint.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    EndTurn,
    Attack,
    PlayCard,
    CastSpell,
    ActivateAbility,
}

/// A board position on a concrete side, as the engine expects it in payloads.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub side: Side,
    pub slot: u8,
}

/// One player intent, ready for dispatch. Constructed through the per-type
/// builders below; the payload map is part of the wire contract (§ action table)
/// and is never edited after construction.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl ClientAction {
    /// `END_TURN` carries no payload.
    pub fn end_turn() -> Self {
        ClientAction {
            action_type: ActionType::EndTurn,
            payload: Map::new(),
        }
    }

    /// `ATTACK` with the attacking unit's own-board slot.
    pub fn attack(attacker_slot: u8) -> Self {
        let mut payload = Map::new();
        payload.insert("attackerSlot".into(), json!(attacker_slot));
        ClientAction {
            action_type: ActionType::Attack,
            payload,
        }
    }

    /// `PLAY_CARD` from hand into an own-board slot.
    pub fn play_card(card_id: &str, slot: u8) -> Self {
        let mut payload = Map::new();
        payload.insert("cardId".into(), json!(card_id));
        payload.insert("slot".into(), json!(slot));
        ClientAction {
            action_type: ActionType::PlayCard,
            payload,
        }
    }

    /// `CAST_SPELL`, optionally with a named sub-variant and a target.
    pub fn cast_spell(card_id: &str, choice: Option<&str>, target: Option<TargetRef>) -> Self {
        let mut payload = Map::new();
        payload.insert("cardId".into(), json!(card_id));
        if let Some(choice) = choice {
            payload.insert("choice".into(), json!(choice));
        }
        if let Some(target) = target {
            payload.insert("target".into(), json!(target));
        }
        ClientAction {
            action_type: ActionType::CastSpell,
            payload,
        }
    }

    /// `ACTIVATE_ABILITY` for the unit in `source_slot`. `extra` carries the
    /// ability-specific fields; their meaning lives in the engine.
    pub fn activate_ability(source_slot: u8, ability_key: &str, extra: Map<String, Value>) -> Self {
        let mut payload = Map::new();
        payload.insert("source".into(), json!({ "slot": source_slot }));
        payload.insert("abilityKey".into(), json!(ability_key));
        for (key, value) in extra {
            payload.insert(key, value);
        }
        ClientAction {
            action_type: ActionType::ActivateAbility,
            payload,
        }
    }
}

/// The unit actually sent over the wire.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEnvelope {
    pub action: ClientAction,
    pub client_action_id: Uuid,
}

impl DispatchEnvelope {
    /// Wraps an action with its structural-signature id.
    pub fn new(action: ClientAction) -> Self {
        let client_action_id = signature_id(&action);
        DispatchEnvelope {
            action,
            client_action_id,
        }
    }

    /// Wraps an action with a random id, for callers that explicitly want the
    /// engine to treat this as a brand-new request.
    pub fn with_fresh_id(action: ClientAction) -> Self {
        DispatchEnvelope {
            action,
            client_action_id: Uuid::new_v4(),
        }
    }
}

/// Derives a stable id from the structural signature of `(type, payload)`.
///
/// The payload map keeps its entries sorted by key, so serializing it yields
/// canonical bytes and structurally identical actions hash identically.
pub fn signature_id(action: &ClientAction) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&action.action_type).expect("action type serializes"));
    hasher.update(serde_json::to_vec(&action.payload).expect("payload map serializes"));
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}
