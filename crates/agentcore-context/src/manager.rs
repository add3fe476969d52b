//! Context Manager: bounds transcript token usage by estimating
//! usage and triggering a pluggable compaction strategy.

use crate::estimator::estimate_tokens;
use crate::strategy::{CompactionContext, CompactionStrategy};
use agentcore_types::{CompactionError, ContextUsage, SessionId, Transcript, TranscriptEntry};
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct CompactionStatistics {
    pub compaction_count: u64,
    pub total_tokens_saved: u64,
    pub last_usage: Option<ContextUsage>,
}

pub struct ContextManagerConfig {
    pub context_window_size: u64,
    pub reserved_response_tokens: u64,
    pub warning_threshold: f64,
    pub compaction_threshold: f64,
}

impl ContextManagerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.warning_threshold)
            || !(0.0..=1.0).contains(&self.compaction_threshold)
        {
            return Err("thresholds must be within [0.0, 1.0]".to_string());
        }
        if self.warning_threshold > self.compaction_threshold {
            return Err("warning_threshold must be <= compaction_threshold".to_string());
        }
        if self.reserved_response_tokens >= self.context_window_size {
            return Err("reserved_response_tokens must be < context_window_size".to_string());
        }
        Ok(())
    }
}

/// Bounds transcript token usage and triggers compaction when thresholds
/// are exceeded. Holds statistics behind a `tokio::sync::RwLock`.
pub struct ContextManager {
    config: ContextManagerConfig,
    strategy: Box<dyn CompactionStrategy>,
    stats: RwLock<CompactionStatistics>,
    preserved_indices: RwLock<HashSet<usize>>,
}

impl ContextManager {
    pub fn new(
        config: ContextManagerConfig,
        strategy: Box<dyn CompactionStrategy>,
    ) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            config,
            strategy,
            stats: RwLock::new(CompactionStatistics::default()),
            preserved_indices: RwLock::new(HashSet::new()),
        })
    }

    pub async fn mark_preserved(&self, index: usize) {
        self.preserved_indices.write().await.insert(index);
    }

    pub async fn statistics(&self) -> CompactionStatistics {
        self.stats.read().await.clone()
    }

    pub fn estimate_usage(&self, entries: &[TranscriptEntry]) -> ContextUsage {
        let estimated_tokens = estimate_tokens(entries);
        let tool_call_count = entries
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::ToolCalls { .. }))
            .count();
        let response_count = entries
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::Response { .. }))
            .count();
        ContextUsage {
            estimated_tokens,
            context_window_size: self.config.context_window_size,
            entry_count: entries.len(),
            tool_call_count,
            response_count,
            timestamp: Utc::now(),
        }
    }

    /// Computes current usage; if it is below `compaction_threshold` this is
    /// a no-op, otherwise the configured strategy is applied against a 60%
    /// target of the remaining budget.
    pub async fn compact_if_needed(
        &self,
        transcript: &mut Transcript,
        session_id: SessionId,
    ) -> Result<bool, CompactionError> {
        let usage = self.estimate_usage(transcript.entries());
        let ratio = usage.usage_ratio();

        {
            let mut stats = self.stats.write().await;
            stats.last_usage = Some(usage.clone());
        }

        if ratio < self.config.compaction_threshold {
            debug!(session = %session_id, ratio, "usage below compaction threshold, skipping");
            return Ok(false);
        }

        let target_tokens = ((self.config.context_window_size
            - self.config.reserved_response_tokens) as f64
            * 0.6) as u64;

        let preserved = self.preserved_indices.read().await.clone();
        let ctx = CompactionContext {
            session_id: session_id.clone(),
            usage: usage.clone(),
            trigger_threshold: self.config.compaction_threshold,
            preserved_indices: preserved,
        };

        let before_tokens = usage.estimated_tokens;
        let compacted = self.strategy.compact(transcript.entries(), target_tokens, &ctx)?;
        let after_tokens = estimate_tokens(&compacted);

        transcript.replace_all(compacted);

        let mut stats = self.stats.write().await;
        stats.compaction_count += 1;
        stats.total_tokens_saved += before_tokens.saturating_sub(after_tokens);
        info!(
            session = %session_id,
            strategy = self.strategy.name(),
            before_tokens,
            after_tokens,
            "compacted transcript"
        );

        Ok(true)
    }
}
