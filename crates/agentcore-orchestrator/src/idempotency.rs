//! Idempotent turn dispatch: a request for a `turn_id` already
//! brought to a non-cancelled terminal state is silently dropped rather
//! than re-executed. Two generations, same rollover scheme as
//! [`crate::cancel::CancelRegistry`], so a long session's set of completed
//! turn ids never grows unbounded.

use agentcore_types::TurnId;
use std::collections::HashSet;
use std::sync::Mutex;

pub struct CompletedTurns {
    current: Mutex<HashSet<TurnId>>,
    previous: Mutex<HashSet<TurnId>>,
    capacity: usize,
}

impl CompletedTurns {
    pub fn new(capacity: usize) -> Self {
        Self {
            current: Mutex::new(HashSet::new()),
            previous: Mutex::new(HashSet::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn is_terminal(&self, turn_id: &TurnId) -> bool {
        self.current.lock().unwrap().contains(turn_id) || self.previous.lock().unwrap().contains(turn_id)
    }

    pub fn record(&self, turn_id: TurnId) {
        let mut current = self.current.lock().unwrap();
        if current.len() >= self.capacity && !current.contains(&turn_id) {
            let rolled = std::mem::take(&mut *current);
            *self.previous.lock().unwrap() = rolled;
        }
        current.insert(turn_id);
    }
}
