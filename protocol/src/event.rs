//! Engine responses: events, rule rejections and the payload wrapper shared by
//! the fetch and action endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::snapshot::MatchSnapshot;

/// One server-emitted event record, used only for transient UI feedback.
/// The kind vocabulary belongs to the engine and stays opaque here.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default, flatten)]
    pub data: Map<String, Value>,
}

/// A business-rule rejection. Not a transport error: the engine declined the
/// action but the response is well-formed and may carry corrective state.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub code: String,
    #[serde(default, flatten)]
    pub data: Map<String, Value>,
}

/// The body of both `GET /matches/{id}` and `POST /matches/{id}/actions`.
/// Every field is optional on the wire; absent state means "nothing to adopt".
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<MatchSnapshot>,
    #[serde(default)]
    pub events: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<Rejection>,
}
