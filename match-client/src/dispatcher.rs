//! Single-flight action submission.
//!
//! One dispatch may be outstanding at a time; a second attempt fails fast with
//! [`DispatchError::InFlight`] and performs no network work. Each logically
//! identical action carries the same client action id, so a retry after a
//! timeout is indistinguishable to the engine from the original attempt.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use protocol::{ClientAction, DispatchEnvelope, ServerPayload, signature_id};
use uuid::Uuid;

use crate::error::{DispatchError, TransportError};
use crate::transport::MatchTransport;

/// How many action signatures keep their id cached before FIFO eviction.
pub const DEFAULT_SIGNATURE_CACHE_CAPACITY: usize = 80;

/// How long a dispatch may run before it resolves to `Timeout`.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// The dispatch gate. `Sending` is the only blocking state; `Cooldown` records
/// that a request just settled, for UI double-click gating, and relaxes back
/// to `Idle` on the next probe or dispatch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchGate {
    Idle,
    Sending,
    Cooldown,
}

/// Maps the structural signature of an action to the fresh id forced for it.
/// Only forced ids occupy a slot, the default id re-derives from the action
/// itself. Bounded; the oldest forced signature is evicted first, after which
/// that action falls back to its derived id.
struct SignatureCache {
    ids: HashMap<Uuid, Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl SignatureCache {
    fn new(capacity: usize) -> SignatureCache {
        SignatureCache {
            ids: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, signature: Uuid, id: Uuid) {
        if !self.ids.contains_key(&signature) {
            if self.order.len() == self.capacity
                && let Some(evicted) = self.order.pop_front()
            {
                self.ids.remove(&evicted);
            }
            self.order.push_back(signature);
        }
        self.ids.insert(signature, id);
    }

    /// The id for this action: the cached one, unless the caller forces a
    /// fresh one, which then replaces the cached entry.
    fn id_for(&mut self, action: &ClientAction, force_new_id: bool) -> Uuid {
        let signature = signature_id(action);
        if force_new_id {
            let fresh = Uuid::new_v4();
            self.insert(signature, fresh);
            return fresh;
        }
        self.ids.get(&signature).copied().unwrap_or(signature)
    }
}

/// Submits actions to the engine, one at a time.
pub struct ActionDispatcher<T: MatchTransport> {
    transport: Arc<T>,
    gate: Mutex<DispatchGate>,
    cache: Mutex<SignatureCache>,
    timeout: Duration,
}

impl<T: MatchTransport> ActionDispatcher<T> {
    pub fn new(transport: Arc<T>) -> ActionDispatcher<T> {
        Self::with_tuning(transport, DEFAULT_DISPATCH_TIMEOUT, DEFAULT_SIGNATURE_CACHE_CAPACITY)
    }

    pub fn with_tuning(
        transport: Arc<T>,
        timeout: Duration,
        cache_capacity: usize,
    ) -> ActionDispatcher<T> {
        ActionDispatcher {
            transport,
            gate: Mutex::new(DispatchGate::Idle),
            cache: Mutex::new(SignatureCache::new(cache_capacity)),
            timeout,
        }
    }

    /// Probes the gate for UI gating. Probing acknowledges a cooldown.
    pub fn gate(&self) -> DispatchGate {
        let mut gate = self.gate.lock().expect("dispatch gate poisoned");
        if *gate == DispatchGate::Cooldown {
            *gate = DispatchGate::Idle;
            return DispatchGate::Cooldown;
        }
        *gate
    }

    /// Whether a request is outstanding right now.
    pub fn is_sending(&self) -> bool {
        *self.gate.lock().expect("dispatch gate poisoned") == DispatchGate::Sending
    }

    /// Submits one action. Fails fast with [`DispatchError::InFlight`] while a
    /// previous dispatch is outstanding; resolves to `Timeout` if the engine
    /// does not answer within the configured window (in which case the caller
    /// may re-dispatch the identical action and reuse the same id).
    ///
    /// A rule rejection from the engine is not an error here: the returned
    /// payload carries `rejected` and must still be applied by the caller.
    pub async fn dispatch(
        &self,
        match_id: &str,
        action: ClientAction,
        force_new_id: bool,
    ) -> Result<ServerPayload, DispatchError> {
        {
            let mut gate = self.gate.lock().expect("dispatch gate poisoned");
            if *gate == DispatchGate::Sending {
                return Err(DispatchError::InFlight);
            }
            *gate = DispatchGate::Sending;
        }

        let client_action_id = self
            .cache
            .lock()
            .expect("signature cache poisoned")
            .id_for(&action, force_new_id);
        let envelope = DispatchEnvelope {
            action,
            client_action_id,
        };
        tracing::debug!(%client_action_id, kind = ?envelope.action.action_type, "dispatching action");

        let raced = tokio::time::timeout(
            self.timeout,
            self.transport.submit_action(match_id, &envelope),
        )
        .await;

        // The request has settled one way or the other; free the gate before
        // reporting, so a retry is possible immediately.
        *self.gate.lock().expect("dispatch gate poisoned") = DispatchGate::Cooldown;

        match raced {
            Ok(Ok(payload)) => {
                if let Some(rejection) = &payload.rejected {
                    tracing::info!(code = %rejection.code, "engine rejected the action");
                }
                Ok(payload)
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "action submission failed");
                Err(error.into())
            }
            Err(_elapsed) => {
                tracing::warn!(%client_action_id, "action submission timed out");
                Err(TransportError::Timeout.into())
            }
        }
    }
}
