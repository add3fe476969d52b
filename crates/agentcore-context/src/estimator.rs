//! Token-usage estimation: a chars-per-token heuristic with
//! per-variant overheads.

use agentcore_types::TranscriptEntry;

pub const CHARS_PER_TOKEN: f64 = 4.0;
const INSTRUCTIONS_OVERHEAD_CHARS: f64 = 500.0;
const TOOL_CALL_OVERHEAD_CHARS: f64 = 100.0;

/// Token estimate for a single transcript entry, including its overhead.
pub fn estimate_entry_tokens(entry: &TranscriptEntry) -> u64 {
    let mut chars = entry.text().chars().count() as f64;
    chars += overhead_chars(entry);
    (chars / CHARS_PER_TOKEN).ceil() as u64
}

fn overhead_chars(entry: &TranscriptEntry) -> f64 {
    match entry {
        TranscriptEntry::Instructions { .. } => INSTRUCTIONS_OVERHEAD_CHARS,
        TranscriptEntry::ToolCalls { count, .. } => (*count as f64) * TOOL_CALL_OVERHEAD_CHARS,
        _ => 0.0,
    }
}

/// Sums per-entry estimates across a whole entry slice.
pub fn estimate_tokens(entries: &[TranscriptEntry]) -> u64 {
    entries.iter().map(estimate_entry_tokens).sum()
}
