//! Configuration file watcher
//!
//! Polls the config file's modification time. When it changes, voice listening
//! is paused, the user is asked whether to apply the new configuration, and on
//! a yes the file is reloaded and the engines and integrations are rebuilt.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::assistant::Assistant;
use crate::events::Sender;

/// Words accepted as "yes"
const AFFIRMATIVE: &[&str] = &["sí", "si", "yes", "s", "ok", "vale", "y"];

const RELOAD_QUESTION: &str = "¿Deseas aplicar la nueva configuración? Responde 'sí' o 'no'.";

/// What happened to a detected change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Reloaded and applied
    Applied,
    /// The user said something other than yes
    Declined,
    /// No reply before the timeout
    TimedOut,
    /// The new file was rejected; the previous settings stay in effect
    Failed(String),
}

/// Whether `reply` contains an affirmative word
#[must_use]
pub fn is_affirmative(reply: &str) -> bool {
    reply
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| AFFIRMATIVE.contains(&word))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Watches the config file behind an assistant
pub struct ConfigWatcher {
    assistant: Arc<Assistant>,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Start from the file's current modification time
    #[must_use]
    pub fn new(assistant: Arc<Assistant>) -> Self {
        let last_modified = modified(assistant.config().path());
        Self {
            assistant,
            last_modified,
        }
    }

    /// Check the file once; true if it changed since the last check
    ///
    /// A missing file is never a change.
    pub fn poll_change(&mut self) -> bool {
        let Some(current) = modified(self.assistant.config().path()) else {
            return false;
        };
        if self.last_modified == Some(current) {
            return false;
        }
        self.last_modified = Some(current);
        true
    }

    /// Ask for confirmation and apply the new configuration on a yes
    ///
    /// Listening is paused for the whole exchange. The pause nests with any
    /// other held pause, such as a command still being resolved.
    pub async fn confirm_and_apply(&self) -> ReloadOutcome {
        let assistant = &self.assistant;
        let sink = assistant.sink();
        let _paused = assistant.listening().pause();

        sink.message(Sender::System, "Detectado cambio en el archivo de configuración.");
        let timeout = assistant.config().snapshot().confirm_timeout();

        let outcome = match assistant.ask(RELOAD_QUESTION, timeout).await {
            None => ReloadOutcome::TimedOut,
            Some(reply) if !is_affirmative(reply.text()) => ReloadOutcome::Declined,
            Some(_) => match assistant.config().reload() {
                Ok(settings) => {
                    sink.message(Sender::System, "Recargando configuración...");
                    assistant.apply_config_changes(&settings);
                    ReloadOutcome::Applied
                }
                Err(e) => ReloadOutcome::Failed(e.to_string()),
            },
        };

        match &outcome {
            ReloadOutcome::Applied => sink.message(Sender::System, "Configuración aplicada."),
            ReloadOutcome::Declined => sink.message(Sender::System, "Configuración NO recargada."),
            ReloadOutcome::TimedOut => sink.message(
                Sender::System,
                "Sin respuesta. Configuración NO recargada.",
            ),
            ReloadOutcome::Failed(reason) => {
                sink.error(&format!("No se pudo recargar la configuración: {reason}"));
            }
        }
        tracing::info!(?outcome, "config change handled");
        outcome
    }

    /// Poll forever
    pub async fn run(mut self) {
        tracing::info!(path = %self.assistant.config().path().display(), "config watcher started");
        loop {
            let interval = self.assistant.config().snapshot().watch_interval();
            tokio::time::sleep(interval.max(crate::assistant::IDLE_POLL)).await;

            if self.poll_change() {
                self.confirm_and_apply().await;
            }
        }
    }
}
