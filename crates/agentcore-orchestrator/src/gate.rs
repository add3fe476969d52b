//! `TurnGate`: holds the receive loop still while a turn is
//! executing, for transports where `supports_background_receive` is
//! `false`.
//!
//! A console transport shares one stdin stream between ordinary input and
//! an interactive approval prompt raised mid-turn, so the receive loop must
//! stop pulling from that stream until the turn currently holding it
//! finishes - otherwise a `receive()` call and an approval prompt's
//! `read_line` race over the same bytes.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

pub struct TurnGate {
    active: AtomicBool,
    notify: Notify,
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnGate {
    pub fn new() -> Self {
        Self { active: AtomicBool::new(false), notify: Notify::new() }
    }

    /// Blocks until no turn holds the gate. Called by the receive loop
    /// before every `receive()`.
    pub async fn wait_if_needed(&self) {
        while self.active.load(Ordering::Acquire) {
            self.notify.notified().await;
        }
    }

    /// Called by the turn processor when it dispatches a turn.
    pub fn enter_turn(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Called by the turn processor once the turn reaches a terminal
    /// event.
    pub fn leave_turn(&self) {
        self.active.store(false, Ordering::Release);
        self.notify.notify_waiters();
    }
}
