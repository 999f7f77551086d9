//! Jarvis - voice and text assistant front-end
//!
//! This library provides the core of the Jarvis assistant:
//! - Voice capture with energy-based utterance detection
//! - Wake phrase and command state machine
//! - Speech-to-text and text-to-speech adapters
//! - Integrations and AI backends for answering commands
//! - Live configuration reload with confirmation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        Microphone   │   Terminal (stdin/stdout)      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Assistant                         │
//! │  Recorder │ STT │ State machine │ Watcher │ TTS      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Resolver                          │
//! │        Integrations  →  AI backend  →  fallback      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod ai;
pub mod assistant;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod input;
pub mod integrations;
pub mod memory;
pub mod race;
pub mod resolver;
pub mod voice;
pub mod watcher;

pub use assistant::{Assistant, AssistantBuilder, Engines};
pub use config::{ConfigStore, Settings};
pub use error::{Error, Result};
pub use events::{PresentationSink, Sender, UiEvent};
pub use watcher::ConfigWatcher;
