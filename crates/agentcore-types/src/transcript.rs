//! Conversation transcript. An ordered, index-stable sequence of
//! entries that the Context Manager bounds via compaction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TranscriptEntry {
    Instructions { text: String },
    Prompt { text: String },
    Response { text: String },
    ToolCalls { count: usize, text: String },
    ToolOutput { text: String },
}

impl TranscriptEntry {
    pub fn text(&self) -> &str {
        match self {
            TranscriptEntry::Instructions { text }
            | TranscriptEntry::Prompt { text }
            | TranscriptEntry::Response { text }
            | TranscriptEntry::ToolCalls { text, .. }
            | TranscriptEntry::ToolOutput { text } => text,
        }
    }

    pub fn is_instructions(&self) -> bool {
        matches!(self, TranscriptEntry::Instructions { .. })
    }

    pub fn is_tool_output(&self) -> bool {
        matches!(self, TranscriptEntry::ToolOutput { .. })
    }

    /// Default type-priority score used by the Priority compaction strategy.
    pub fn default_type_priority(&self) -> u32 {
        match self {
            TranscriptEntry::Instructions { .. } => 100,
            TranscriptEntry::Prompt { .. } => 50,
            TranscriptEntry::Response { .. } => 40,
            TranscriptEntry::ToolCalls { .. } => 30,
            TranscriptEntry::ToolOutput { .. } => 20,
        }
    }
}

/// Ordered conversation entries. Invariant: at most one `Instructions` entry,
/// and it appears first when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets (or replaces) the leading Instructions entry.
    pub fn set_instructions(&mut self, text: impl Into<String>) {
        let entry = TranscriptEntry::Instructions { text: text.into() };
        if self.entries.first().map(|e| e.is_instructions()).unwrap_or(false) {
            self.entries[0] = entry;
        } else {
            self.entries.insert(0, entry);
        }
    }

    pub fn instructions(&self) -> Option<&str> {
        self.entries.first().and_then(|e| match e {
            TranscriptEntry::Instructions { text } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        debug_assert!(!entry.is_instructions(), "use set_instructions for the leading entry");
        self.entries.push(entry);
    }

    /// Replaces all entries, keeping whatever invariant the caller already
    /// established (used by compaction strategies).
    pub fn replace_all(&mut self, entries: Vec<TranscriptEntry>) {
        self.entries = entries;
    }
}
