//! Conversation memory

use chrono::{DateTime, Local};

/// Number of recent exchanges passed to the AI backend
pub const CONTEXT_ENTRIES: usize = 5;

/// One resolved command and its answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// What the user asked
    pub command: String,
    /// What the assistant answered
    pub response: String,
    /// When the answer was produced
    pub at: DateTime<Local>,
}

/// Ordered history of exchanges for this session
#[derive(Debug, Default)]
pub struct ConversationMemory {
    entries: Vec<Exchange>,
}

impl ConversationMemory {
    /// Create an empty memory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exchange
    pub fn record(&mut self, command: &str, response: &str) {
        self.entries.push(Exchange {
            command: command.to_string(),
            response: response.to_string(),
            at: Local::now(),
        });
    }

    /// Number of recorded exchanges
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent exchanges, oldest first, one line each
    #[must_use]
    pub fn context(&self) -> Vec<String> {
        let start = self.entries.len().saturating_sub(CONTEXT_ENTRIES);
        self.entries[start..]
            .iter()
            .map(|e| format!("Usuario: {} | Jarvis: {}", e.command, e.response))
            .collect()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
