//! Caption Data Models

use serde::{Deserialize, Serialize};

/// One SRT block: sequence number, time span and text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Sequence number as written in the source
    pub index: u32,
    /// Start time in milliseconds
    pub start_ms: u64,
    /// End time in milliseconds
    pub end_ms: u64,
    /// Cue text; lines joined with `\n`
    pub text: String,
}

impl Cue {
    pub fn new(index: u32, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Display duration; zero when the end precedes the start
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Whether two cues share any displayed instant
    pub fn overlaps(&self, other: &Cue) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }
}
