//! Wake phrase and command state machine
//!
//! ```text
//!            wake + command                     resolution done
//!   Idle ───────────────────────────► Busy ──────────────────► Idle
//!    │                                 ▲
//!    │ wake alone                      │ valid utterance
//!    ▼                                 │ within window
//!   Armed ─────────────────────────────┘
//!    │ window elapsed
//!    └──────────────────────────────────────────────────────► Idle
//! ```
//!
//! The machine is pure: callers pass the current time and a [`CommandRules`]
//! built from the settings snapshot they loaded for this cycle.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Settings;

/// Words that end the process when sent on their own
const EXIT_WORDS: &[&str] = &["salir", "adios", "adiós"];

/// Characters trimmed around the text that follows a wake phrase
const REMAINDER_TRIM: &[char] = &[',', '.', '!', '?', '¡', '¿'];

/// Assistant interaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantState {
    /// Waiting for a wake phrase
    Idle,
    /// Wake phrase heard, waiting for the command until `deadline`
    Armed {
        /// End of the follow-up window
        deadline: Instant,
    },
    /// A command is being resolved
    Busy,
}

impl AssistantState {
    /// Whether this is the armed state
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }
}

/// Why a command was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing left after trimming
    Empty,
    /// Fewer characters than the configured minimum
    TooShort,
    /// Contains a known transcription artifact
    Noise(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty command"),
            Self::TooShort => f.write_str("command too short"),
            Self::Noise(phrase) => write!(f, "transcription noise ({phrase})"),
        }
    }
}

/// Result of feeding an utterance to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Entered Busy with this command
    Command(String),
    /// Wake phrase alone; the follow-up window is open
    Armed,
    /// No state change
    Ignored(IgnoreReason),
}

/// Why an utterance caused no transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Idle and no wake phrase present
    NoWakePhrase,
    /// A command is already being resolved
    Busy,
    /// The command failed validation
    Rejected(Rejection),
}

/// Wake phrases and validation limits from one settings snapshot
#[derive(Debug, Clone)]
pub struct CommandRules {
    wake_words: Vec<String>,
    min_chars: usize,
    noise_phrases: Vec<String>,
    window: Duration,
}

impl CommandRules {
    /// Build from a settings snapshot
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            wake_words: settings
                .wake_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            min_chars: settings.min_command_chars,
            noise_phrases: settings
                .noise_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            window: settings.command_window(),
        }
    }

    /// Follow-up window after a bare wake phrase
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Find the first configured wake phrase in `text`
    ///
    /// Returns the phrase and the lowercased text that follows its first
    /// occurrence, trimmed of whitespace and punctuation.
    #[must_use]
    pub fn match_wake<'a>(&'a self, text: &str) -> Option<(&'a str, String)> {
        let lower = text.to_lowercase();
        self.wake_words.iter().find_map(|wake| {
            let pos = lower.find(wake.as_str())?;
            let remainder = lower[pos + wake.len()..]
                .trim_matches(|c: char| c.is_whitespace() || REMAINDER_TRIM.contains(&c))
                .to_string();
            Some((wake.as_str(), remainder))
        })
    }

    /// Check a command against the length floor and the noise list
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] reason
    pub fn validate(&self, command: &str) -> Result<(), Rejection> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Rejection::Empty);
        }
        if command.chars().count() < self.min_chars {
            return Err(Rejection::TooShort);
        }
        let lower = command.to_lowercase();
        if let Some(phrase) = self.noise_phrases.iter().find(|p| lower.contains(p.as_str())) {
            return Err(Rejection::Noise(phrase.clone()));
        }
        Ok(())
    }
}

/// Whether `text` is an exit command
#[must_use]
pub fn is_exit_command(text: &str) -> bool {
    let text = text
        .trim_matches(|c: char| c.is_whitespace() || REMAINDER_TRIM.contains(&c))
        .to_lowercase();
    EXIT_WORDS.contains(&text.as_str())
}

/// The wake/command state machine
#[derive(Debug)]
pub struct StateMachine {
    state: AssistantState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Start in Idle
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AssistantState::Idle,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> AssistantState {
        self.state
    }

    /// Feed a voice utterance
    pub fn on_utterance(&mut self, text: &str, rules: &CommandRules, now: Instant) -> Transition {
        self.expire(now);

        match self.state {
            AssistantState::Busy => Transition::Ignored(IgnoreReason::Busy),
            AssistantState::Idle => match rules.match_wake(text) {
                None => Transition::Ignored(IgnoreReason::NoWakePhrase),
                Some((wake, remainder)) if remainder.is_empty() => {
                    tracing::info!(wake, "wake phrase heard, awaiting command");
                    self.arm(rules, now)
                }
                Some((wake, remainder)) => {
                    tracing::info!(wake, command = %remainder, "wake phrase with command");
                    self.try_command(remainder, rules)
                }
            },
            AssistantState::Armed { .. } => match rules.match_wake(text) {
                Some((_, remainder)) if remainder.is_empty() => self.arm(rules, now),
                Some((_, remainder)) => self.try_command(remainder, rules),
                None => self.try_command(text.trim().to_lowercase(), rules),
            },
        }
    }

    /// Feed a typed command, which needs no wake phrase
    pub fn on_text(&mut self, text: &str, rules: &CommandRules) -> Transition {
        if self.state == AssistantState::Busy {
            return Transition::Ignored(IgnoreReason::Busy);
        }
        self.try_command(text.trim().to_string(), rules)
    }

    /// Close an elapsed follow-up window; returns true if it did
    pub fn expire(&mut self, now: Instant) -> bool {
        if let AssistantState::Armed { deadline } = self.state
            && now >= deadline
        {
            tracing::debug!("command window elapsed");
            self.state = AssistantState::Idle;
            return true;
        }
        false
    }

    /// Push an armed deadline back by time spent paused
    pub fn extend_window(&mut self, paused: Duration) {
        if let AssistantState::Armed { deadline } = &mut self.state {
            *deadline += paused;
        }
    }

    /// Leave Busy after resolution, whatever its outcome
    pub fn finish(&mut self) {
        self.state = AssistantState::Idle;
    }

    fn arm(&mut self, rules: &CommandRules, now: Instant) -> Transition {
        self.state = AssistantState::Armed {
            deadline: now + rules.window(),
        };
        Transition::Armed
    }

    fn try_command(&mut self, command: String, rules: &CommandRules) -> Transition {
        match rules.validate(&command) {
            Ok(()) => {
                self.state = AssistantState::Busy;
                Transition::Command(command)
            }
            Err(reason) => {
                tracing::debug!(command, %reason, "command rejected");
                Transition::Ignored(IgnoreReason::Rejected(reason))
            }
        }
    }
}
