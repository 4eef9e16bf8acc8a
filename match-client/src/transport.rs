//! Does all communication with the remote match engine over HTTP.
//!
//! The engine is polled with `GET /matches/{id}` and actions go out as
//! `POST /matches/{id}/actions`. Everything network-shaped sits behind the
//! [`MatchTransport`] trait so the rest of the client (and the tests) never
//! touch a socket directly.

use async_trait::async_trait;
use protocol::{DispatchEnvelope, ServerPayload};

use crate::error::TransportError;

/// The wire seam to the engine.
#[async_trait]
pub trait MatchTransport: Send + Sync + 'static {
    /// Fetches the current payload for a match.
    async fn fetch_match(&self, match_id: &str) -> Result<ServerPayload, TransportError>;

    /// Submits one action envelope and returns the engine's patch.
    async fn submit_action(
        &self,
        match_id: &str,
        envelope: &DispatchEnvelope,
    ) -> Result<ServerPayload, TransportError>;
}

/// The production transport: JSON over HTTP with a bearer credential attached
/// to every request. Token acquisition and refresh live with the embedder.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl HttpTransport {
    /// `base_url` is the engine root, e.g. `https://engine.example.com/api`.
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> HttpTransport {
        HttpTransport {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        }
    }

    fn match_url(&self, match_id: &str) -> String {
        format!("{}/matches/{}", self.base_url, match_id)
    }

    async fn decode(response: reqwest::Response) -> Result<ServerPayload, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::BadStatus(status.as_u16()));
        }
        let body = response.bytes().await?;
        let payload = serde_json::from_slice(&body)?;
        Ok(payload)
    }
}

#[async_trait]
impl MatchTransport for HttpTransport {
    async fn fetch_match(&self, match_id: &str) -> Result<ServerPayload, TransportError> {
        let response = self
            .client
            .get(self.match_url(match_id))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn submit_action(
        &self,
        match_id: &str,
        envelope: &DispatchEnvelope,
    ) -> Result<ServerPayload, TransportError> {
        let response = self
            .client
            .post(format!("{}/actions", self.match_url(match_id)))
            .bearer_auth(&self.bearer_token)
            .json(envelope)
            .send()
            .await?;
        Self::decode(response).await
    }
}
