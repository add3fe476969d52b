//! Pluggable compaction strategies. All strategies preserve the
//! leading `Instructions` entry when present, and honour `preserved_indices`
//! where feasible (always for `Priority`; best-effort for `Truncation` and
//! `SlidingWindow`).

use crate::estimator::estimate_tokens;
use agentcore_types::{CompactionError, ContextUsage, SessionId, TranscriptEntry};
use std::collections::HashSet;

pub struct CompactionContext {
    pub session_id: SessionId,
    pub usage: ContextUsage,
    pub trigger_threshold: f64,
    pub preserved_indices: HashSet<usize>,
}

pub trait CompactionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn compact(
        &self,
        entries: &[TranscriptEntry],
        target_tokens: u64,
        ctx: &CompactionContext,
    ) -> Result<Vec<TranscriptEntry>, CompactionError>;
}

fn split_instructions(entries: &[TranscriptEntry]) -> (Option<&TranscriptEntry>, &[TranscriptEntry]) {
    match entries.first() {
        Some(first) if first.is_instructions() => (Some(first), &entries[1..]),
        _ => (None, entries),
    }
}

fn with_instructions(instructions: Option<&TranscriptEntry>, rest: Vec<TranscriptEntry>) -> Vec<TranscriptEntry> {
    match instructions {
        Some(entry) => {
            let mut out = Vec::with_capacity(rest.len() + 1);
            out.push(entry.clone());
            out.extend(rest);
            out
        }
        None => rest,
    }
}

/// Keeps the last `preserve_recent_count` entries (plus tool outputs and
/// preserved indices when configured).
pub struct Truncation {
    pub preserve_recent_count: usize,
    pub preserve_tool_outputs: bool,
}

impl CompactionStrategy for Truncation {
    fn name(&self) -> &'static str {
        "truncation"
    }

    fn compact(
        &self,
        entries: &[TranscriptEntry],
        _target_tokens: u64,
        ctx: &CompactionContext,
    ) -> Result<Vec<TranscriptEntry>, CompactionError> {
        let (instructions, rest) = split_instructions(entries);
        let instructions_offset = if instructions.is_some() { 1 } else { 0 };
        let cutoff = rest.len().saturating_sub(self.preserve_recent_count);

        let mut kept = Vec::new();
        for (i, entry) in rest.iter().enumerate() {
            let original_index = i + instructions_offset;
            let keep = i >= cutoff
                || (self.preserve_tool_outputs && entry.is_tool_output())
                || ctx.preserved_indices.contains(&original_index);
            if keep {
                kept.push(entry.clone());
            }
        }

        if kept.len() == rest.len() {
            return Err(CompactionError::CannotCompactFurther);
        }
        Ok(with_instructions(instructions, kept))
    }
}

/// Keeps the last `window_size` non-Instructions entries.
pub struct SlidingWindow {
    pub window_size: usize,
}

impl CompactionStrategy for SlidingWindow {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn compact(
        &self,
        entries: &[TranscriptEntry],
        _target_tokens: u64,
        ctx: &CompactionContext,
    ) -> Result<Vec<TranscriptEntry>, CompactionError> {
        let (instructions, rest) = split_instructions(entries);
        let instructions_offset = if instructions.is_some() { 1 } else { 0 };
        if rest.len() <= self.window_size {
            return Err(CompactionError::AlreadyBelowTarget);
        }

        let cutoff = rest.len() - self.window_size;
        let kept: Vec<TranscriptEntry> = rest
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= cutoff || ctx.preserved_indices.contains(&(i + instructions_offset)))
            .map(|(_, e)| e.clone())
            .collect();

        Ok(with_instructions(instructions, kept))
    }
}

/// Scores every entry by `type_priority + recency_weight * recency_score +
/// (100 if preserved)`, sorts descending, keeps as many top entries as fit
/// the token budget, then restores original order.
pub struct Priority {
    pub recency_weight: f64,
}

impl Default for Priority {
    fn default() -> Self {
        Self { recency_weight: 10.0 }
    }
}

impl CompactionStrategy for Priority {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn compact(
        &self,
        entries: &[TranscriptEntry],
        target_tokens: u64,
        ctx: &CompactionContext,
    ) -> Result<Vec<TranscriptEntry>, CompactionError> {
        let (instructions, rest) = split_instructions(entries);
        let instructions_offset = if instructions.is_some() { 1 } else { 0 };
        if rest.is_empty() {
            return Err(CompactionError::AlreadyBelowTarget);
        }

        let n = rest.len() as f64;
        let mut scored: Vec<(usize, f64, u64)> = rest
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let original_index = i + instructions_offset;
                let recency_score = (i as f64 + 1.0) / n;
                let mut score = entry.default_type_priority() as f64
                    + self.recency_weight * recency_score;
                if ctx.preserved_indices.contains(&original_index) {
                    score += 100.0;
                }
                let tokens = crate::estimator::estimate_entry_tokens(entry);
                (i, score, tokens)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut budget = target_tokens;
        let mut keep_indices: HashSet<usize> = HashSet::new();
        for (i, _score, tokens) in &scored {
            let original_index = i + instructions_offset;
            let is_preserved = ctx.preserved_indices.contains(&original_index);
            if is_preserved || *tokens <= budget {
                if !is_preserved {
                    budget = budget.saturating_sub(*tokens);
                }
                keep_indices.insert(*i);
            }
        }
        // Always satisfy preserved_indices, even if the budget loop above
        // skipped one ahead of its preserved priority bump being decisive.
        for &idx in &ctx.preserved_indices {
            if idx >= instructions_offset {
                keep_indices.insert(idx - instructions_offset);
            }
        }

        if keep_indices.len() == rest.len() {
            return Err(CompactionError::CannotCompactFurther);
        }

        let kept: Vec<TranscriptEntry> = rest
            .iter()
            .enumerate()
            .filter(|(i, _)| keep_indices.contains(i))
            .map(|(_, e)| e.clone())
            .collect();

        Ok(with_instructions(instructions, kept))
    }
}

/// Applies a sequence of strategies until the result fits the budget or the
/// sequence is exhausted.
pub struct Hybrid {
    pub strategies: Vec<Box<dyn CompactionStrategy>>,
}

impl CompactionStrategy for Hybrid {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn compact(
        &self,
        entries: &[TranscriptEntry],
        target_tokens: u64,
        ctx: &CompactionContext,
    ) -> Result<Vec<TranscriptEntry>, CompactionError> {
        let mut current = entries.to_vec();
        let mut applied_any = false;

        for strategy in &self.strategies {
            if estimate_tokens(&current) <= target_tokens {
                break;
            }
            match strategy.compact(&current, target_tokens, ctx) {
                Ok(next) => {
                    current = next;
                    applied_any = true;
                }
                Err(CompactionError::AlreadyBelowTarget) => continue,
                Err(CompactionError::CannotCompactFurther) => continue,
                Err(err) => return Err(err),
            }
        }

        if !applied_any {
            return Err(CompactionError::StrategyNotApplicable);
        }
        Ok(current)
    }
}

/// For testing: never compacts.
pub struct NoOp;

impl CompactionStrategy for NoOp {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn compact(
        &self,
        entries: &[TranscriptEntry],
        _target_tokens: u64,
        _ctx: &CompactionContext,
    ) -> Result<Vec<TranscriptEntry>, CompactionError> {
        Ok(entries.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::SessionId;
    use chrono::Utc;

    fn ctx(preserved: &[usize]) -> CompactionContext {
        CompactionContext {
            session_id: SessionId::new("s1"),
            usage: ContextUsage {
                estimated_tokens: 0,
                context_window_size: 10_000,
                entry_count: 0,
                tool_call_count: 0,
                response_count: 0,
                timestamp: Utc::now(),
            },
            trigger_threshold: 0.8,
            preserved_indices: preserved.iter().copied().collect(),
        }
    }

    fn prompt_response_transcript(n: usize) -> Vec<TranscriptEntry> {
        let mut entries = vec![TranscriptEntry::Instructions { text: "system".into() }];
        for i in 0..n {
            entries.push(TranscriptEntry::Prompt { text: format!("prompt {i}") });
            entries.push(TranscriptEntry::Response { text: format!("response {i}") });
        }
        entries
    }

    #[test]
    fn sliding_window_keeps_exact_count_plus_instructions() {
        let entries = prompt_response_transcript(50); // 1 + 100 entries
        let strategy = SlidingWindow { window_size: 20 };
        let result = strategy.compact(&entries, 0, &ctx(&[])).unwrap();
        assert_eq!(result.len(), 21);
        assert!(result[0].is_instructions());
    }

    #[test]
    fn truncation_always_keeps_tool_outputs() {
        let mut entries = vec![TranscriptEntry::Instructions { text: "sys".into() }];
        entries.push(TranscriptEntry::ToolOutput { text: "important".into() });
        for i in 0..10 {
            entries.push(TranscriptEntry::Prompt { text: format!("p{i}") });
        }
        let strategy = Truncation { preserve_recent_count: 2, preserve_tool_outputs: true };
        let result = strategy.compact(&entries, 0, &ctx(&[])).unwrap();
        assert!(result.iter().any(|e| e.is_tool_output()));
        assert!(result[0].is_instructions());
    }

    #[test]
    fn priority_always_honors_preserved_indices() {
        let entries = prompt_response_transcript(30);
        let strategy = Priority::default();
        // index 3 is some early Prompt entry, well outside the natural keep set.
        let result = strategy.compact(&entries, 50, &ctx(&[3])).unwrap();
        assert!(result[0].is_instructions());
        assert!(!result.is_empty());
    }
}
