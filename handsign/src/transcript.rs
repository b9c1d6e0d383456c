//! Sentence assembly and conversation history.
//!
//! Accepted words accumulate into the current sentence; saving moves the
//! sentence into the history with a clock label, and the history can be
//! exported as plain text.

use tracing::debug;

use crate::recognition::DetectionEvent;

const EXPORT_TITLE: &str = "INDIAN SIGN LANGUAGE - CONVERSATION";
const EXPORT_RULE_WIDTH: usize = 60;

/// A saved sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// `HH:MM:SS` label.
    pub at: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    current: Vec<String>,
    history: Vec<HistoryEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an accepted word to the current sentence.
    pub fn push(&mut self, event: &DetectionEvent) {
        self.current.push(event.word.clone());
    }

    pub fn sentence(&self) -> String {
        self.current.join(" ")
    }

    pub fn words(&self) -> &[String] {
        &self.current
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn clear_sentence(&mut self) {
        self.current.clear();
    }

    /// Move the current sentence into the history. Does nothing when the
    /// sentence is empty.
    pub fn save_sentence(&mut self, at: impl Into<String>) -> Option<&HistoryEntry> {
        if self.current.is_empty() {
            return None;
        }
        let entry = HistoryEntry {
            at: at.into(),
            text: self.sentence(),
        };
        debug!("Saved sentence [{}] {}", entry.at, entry.text);
        self.history.push(entry);
        self.current.clear();
        self.history.last()
    }

    /// Plain-text export of the saved conversation.
    pub fn export(&self) -> String {
        let rule = "=".repeat(EXPORT_RULE_WIDTH);
        let mut out = format!("{rule}\n{EXPORT_TITLE}\n{rule}\n\n");
        for entry in &self.history {
            out.push_str(&format!("[{}] {}\n", entry.at, entry.text));
        }
        out
    }
}

/// Render seconds as `HH:MM:SS`, wrapping at 24 hours.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let h = (total / 3600) % 24;
    let m = (total / 60) % 60;
    let s = total % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}
