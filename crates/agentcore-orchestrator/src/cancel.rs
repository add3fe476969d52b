//! Turn-scoped cancellation.
//!
//! A `CancelRegistry` hands out one `CancellationToken` per `turn_id` for
//! the life of the turn, plus one generation of history so a cancel that
//! arrives for a turn not yet dispatched still lands correctly. Cancellation
//! targets a specific `turn_id` within a session that processes turns
//! strictly serially, rather than a single session-wide token.
//!
//! Two generations, bounded to `capacity` entries each, cap memory for a
//! long-lived session without ever dropping a token still in use: the
//! current generation always holds every in-flight turn, and a lookup
//! falls through to the previous generation before giving up.

use agentcore_types::TurnId;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct CancelRegistry {
    current: Mutex<HashMap<TurnId, CancellationToken>>,
    previous: Mutex<HashMap<TurnId, CancellationToken>>,
    /// Cancel requests for a `turn_id` with no token yet (the request
    /// arrived before the turn was dispatched). Drained - and honoured -
    /// the moment that turn starts.
    preemptive: Mutex<HashSet<TurnId>>,
    capacity: usize,
}

impl CancelRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            current: Mutex::new(HashMap::new()),
            previous: Mutex::new(HashMap::new()),
            preemptive: Mutex::new(HashSet::new()),
            capacity: capacity.max(1),
        }
    }

    /// Called by the turn processor when a turn is dispatched: installs a
    /// fresh token, immediately cancelling it if a pre-emptive cancel for
    /// this `turn_id` is pending. A retry with the same `turn_id` overwrites
    /// whatever sentinel was left behind by a prior cancelled attempt.
    pub fn start_turn(&self, turn_id: &TurnId) -> CancellationToken {
        let token = CancellationToken::new();
        self.insert_current(turn_id.clone(), token.clone());
        if self.preemptive.lock().unwrap().remove(turn_id) {
            token.cancel();
        }
        token
    }

    /// Called on a non-cancelled terminal status: the token is no longer
    /// needed by anything and is dropped outright.
    pub fn complete_turn(&self, turn_id: &TurnId) {
        self.current.lock().unwrap().remove(turn_id);
        self.previous.lock().unwrap().remove(turn_id);
    }

    /// Cancels the turn if its token exists yet; otherwise records the
    /// request as pre-emptive so it takes effect as soon as the turn is
    /// dispatched. Deliberately does not remove the token on a cancelled
    /// terminal status - it stays in `current` as a sentinel a late
    /// duplicate cancel can still observe, until generation rollover
    /// evicts it.
    pub fn cancel(&self, turn_id: &TurnId) {
        if let Some(token) = self.current.lock().unwrap().get(turn_id) {
            token.cancel();
            return;
        }
        if let Some(token) = self.previous.lock().unwrap().get(turn_id) {
            token.cancel();
            return;
        }
        let mut preemptive = self.preemptive.lock().unwrap();
        if preemptive.len() >= self.capacity {
            preemptive.clear();
        }
        preemptive.insert(turn_id.clone());
    }

    fn insert_current(&self, turn_id: TurnId, token: CancellationToken) {
        let mut current = self.current.lock().unwrap();
        if current.len() >= self.capacity && !current.contains_key(&turn_id) {
            let rolled = std::mem::take(&mut *current);
            *self.previous.lock().unwrap() = rolled;
        }
        current.insert(turn_id, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preemptive_cancel_takes_effect_on_dispatch() {
        let registry = CancelRegistry::new(10);
        let turn_id = TurnId::new("t1");
        registry.cancel(&turn_id);
        let token = registry.start_turn(&turn_id);
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_after_dispatch_cancels_live_token() {
        let registry = CancelRegistry::new(10);
        let turn_id = TurnId::new("t1");
        let token = registry.start_turn(&turn_id);
        assert!(!token.is_cancelled());
        registry.cancel(&turn_id);
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancelled_sentinel_survives_complete_is_not_called() {
        let registry = CancelRegistry::new(10);
        let turn_id = TurnId::new("t1");
        let token = registry.start_turn(&turn_id);
        registry.cancel(&turn_id);
        // a late duplicate cancel still finds and re-cancels the sentinel
        registry.cancel(&turn_id);
        assert!(token.is_cancelled());
    }

    #[test]
    fn retry_with_same_turn_id_overwrites_sentinel() {
        let registry = CancelRegistry::new(10);
        let turn_id = TurnId::new("t1");
        let first = registry.start_turn(&turn_id);
        registry.cancel(&turn_id);
        assert!(first.is_cancelled());
        let second = registry.start_turn(&turn_id);
        assert!(!second.is_cancelled());
    }

    #[test]
    fn complete_turn_drops_the_token() {
        let registry = CancelRegistry::new(10);
        let turn_id = TurnId::new("t1");
        registry.start_turn(&turn_id);
        registry.complete_turn(&turn_id);
        assert!(registry.current.lock().unwrap().get(&turn_id).is_none());
    }

    #[test]
    fn generation_rollover_bounds_memory() {
        let registry = CancelRegistry::new(2);
        for i in 0..5 {
            registry.start_turn(&TurnId::new(format!("t{i}")));
        }
        let total = registry.current.lock().unwrap().len() + registry.previous.lock().unwrap().len();
        assert!(total <= 4, "expected at most two generations of `capacity`, got {total}");
    }
}
