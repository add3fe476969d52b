//! Context-window usage snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextUsage {
    pub estimated_tokens: u64,
    pub context_window_size: u64,
    pub entry_count: usize,
    pub tool_call_count: usize,
    pub response_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl ContextUsage {
    pub fn usage_ratio(&self) -> f64 {
        if self.context_window_size == 0 {
            return 1.0;
        }
        self.estimated_tokens as f64 / self.context_window_size as f64
    }
}
