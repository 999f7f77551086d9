//! Presentation events
//!
//! The assistant never renders anything itself: it posts [`UiEvent`]s to a
//! [`PresentationSink`]. At runtime the sink is a [`ChannelSink`] feeding the
//! terminal dashboard task through an unbounded channel.

use std::fmt;
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Who a chat line is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// The assistant itself
    Jarvis,
    /// Text typed or spoken by the user
    User,
    /// Status and lifecycle notices
    System,
    /// Diagnostic detail
    Debug,
    /// Failures
    Error,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Jarvis => "Jarvis",
            Self::User => "You",
            Self::System => "System",
            Self::Debug => "Debug",
            Self::Error => "Error",
        };
        f.write_str(label)
    }
}

/// Which engine an [`UiEvent::EngineInfo`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Text-to-speech
    Tts,
    /// AI backend
    Ai,
    /// Speech-to-text
    Stt,
}

/// Event posted to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A line in the chat log
    ChatMessage { sender: Sender, text: String },
    /// Microphone recording on/off
    MicStatus { active: bool },
    /// Active engine name
    EngineInfo { kind: EngineKind, name: String },
    /// Conversation memory counters
    MemoryInfo { entries: usize, corrections: usize },
    /// Loaded integrations with their trigger keywords
    IntegrationsList { integrations: Vec<String> },
}

/// Receives presentation events
pub trait PresentationSink: Send + Sync {
    /// Deliver an event; never blocks and never fails
    fn notify(&self, event: UiEvent);

    /// Post a chat line
    fn message(&self, sender: Sender, text: &str) {
        self.notify(UiEvent::ChatMessage {
            sender,
            text: text.to_string(),
        });
    }

    /// Post an error line
    fn error(&self, text: &str) {
        self.message(Sender::Error, text);
    }

    /// Report the microphone state
    fn mic_status(&self, active: bool) {
        self.notify(UiEvent::MicStatus { active });
    }
}

/// Sink that forwards events to a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end for the dashboard
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PresentationSink for ChannelSink {
    fn notify(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("presentation sink closed, dropping event");
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<UiEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far
    #[must_use]
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Chat lines from one sender
    #[must_use]
    pub fn messages_from(&self, sender: Sender) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::ChatMessage { sender: s, text } if s == sender => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl PresentationSink for MemorySink {
    fn notify(&self, event: UiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
